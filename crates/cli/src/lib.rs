use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use orrery_cache::estimate::{bytes_to_mb, clamp_dimension_to, estimate_bytes};
use orrery_cache::{
    CacheConfig, GpuResource, GpuTextureCache, LoaderCapabilities, MemoryPressure, TextureLoader,
};
use serde::Serialize;
use std::convert::Infallible;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub mod script;

use script::Command;

const DEFAULT_PLATFORM_MAX: u32 = 16384;

#[derive(Debug, Parser)]
#[command(name = "orrery-cli")]
#[command(about = "Orrery texture cache tools")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the estimated memory cost of one cached texture.
    Estimate {
        /// Maximum texture size reported by the platform, in pixels.
        #[arg(
            long = "max-size",
            visible_alias = "platform-max",
            value_name = "PX",
            default_value_t = DEFAULT_PLATFORM_MAX
        )]
        platform_max: u32,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Replay an acquire/release script against a cache with synthetic textures.
    Simulate {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Maximum texture size reported by the platform, in pixels.
        #[arg(
            long = "max-size",
            visible_alias = "platform-max",
            value_name = "PX",
            default_value_t = DEFAULT_PLATFORM_MAX
        )]
        platform_max: u32,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// TOML configuration file (defaults to the platform config directory).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Texture budget in megabytes.
    #[arg(long)]
    budget: Option<f64>,
    /// Warning threshold as a fraction of the budget.
    #[arg(long)]
    threshold: Option<f64>,
    /// Resolution ceiling in pixels.
    #[arg(long)]
    max_dimension: Option<u32>,
}

#[derive(Debug, Serialize)]
struct EstimateOutput {
    platform_max: u32,
    dimension: u32,
    estimated_bytes: u64,
    estimated_mb: f64,
    budget_mb: f64,
    warning_mb: f64,
    textures_before_near_limit: u64,
}

#[derive(Debug, Serialize)]
struct SimulationOutput {
    budget_mb: f64,
    warning_mb: f64,
    steps: Vec<StepOutput>,
    summary: SummaryOutput,
}

#[derive(Debug, Serialize)]
struct StepOutput {
    line: usize,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    outcome: &'static str,
    texture_count: usize,
    memory_used_mb: f64,
    near_limit: bool,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    keys: Vec<String>,
    texture_count: usize,
    memory_used_bytes: u64,
    memory_used_mb: f64,
    near_limit: bool,
    pressure: &'static str,
    hits: u64,
    misses: u64,
    loads: u64,
    releases: u64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Estimate { platform_max, settings } => run_estimate(platform_max, &settings),
        Commands::Simulate { script, platform_max, settings } => {
            run_simulate(&script, platform_max, &settings)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_estimate(platform_max: u32, settings: &SettingsArgs) -> Result<()> {
    let config = resolve_config(settings)?;
    let budget = config.memory_budget();

    let dimension = clamp_dimension_to(platform_max, config.max_texture_dimension);
    let estimated_bytes = estimate_bytes(dimension);
    let estimated_mb = bytes_to_mb(estimated_bytes);

    let payload = EstimateOutput {
        platform_max,
        dimension,
        estimated_bytes,
        estimated_mb,
        budget_mb: budget.budget_mb(),
        warning_mb: budget.warning_mb(),
        textures_before_near_limit: (budget.warning_mb() / estimated_mb).floor() as u64,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_simulate(script_path: &Path, platform_max: u32, settings: &SettingsArgs) -> Result<()> {
    let source = fs::read_to_string(script_path)
        .with_context(|| format!("failed to read script {}", script_path.display()))?;
    let steps = script::parse(&source)
        .with_context(|| format!("invalid script {}", script_path.display()))?;

    let config = resolve_config(settings)?;
    let cache = GpuTextureCache::new(SyntheticLoader { platform_max }, config)?;
    let budget = cache.budget();

    let mut outputs = Vec::with_capacity(steps.len());
    for step in steps {
        let (action, key, outcome) = match step.command {
            Command::Acquire { key, platform_max } => {
                let outcome = if cache.contains(&key) { "cached" } else { "loaded" };
                cache.acquire(&key, platform_max.map(LoaderCapabilities::new))?;
                ("acquire", Some(key), outcome)
            }
            Command::Release { key } => {
                let outcome = if cache.release(&key) { "released" } else { "absent" };
                ("release", Some(key), outcome)
            }
            Command::Clear => {
                cache.clear();
                ("clear", None, "cleared")
            }
        };

        outputs.push(StepOutput {
            line: step.line,
            action,
            key,
            outcome,
            texture_count: cache.len(),
            memory_used_mb: cache.memory_used_mb(),
            near_limit: cache.is_near_limit(),
        });
    }

    let stats = cache.stats();
    let payload = SimulationOutput {
        budget_mb: budget.budget_mb(),
        warning_mb: budget.warning_mb(),
        steps: outputs,
        summary: SummaryOutput {
            keys: cache.keys(),
            texture_count: stats.texture_count,
            memory_used_bytes: stats.memory_used,
            memory_used_mb: stats.memory_used_mb(),
            near_limit: cache.is_near_limit(),
            pressure: pressure_label(cache.pressure()),
            hits: stats.hits,
            misses: stats.misses,
            loads: stats.loads,
            releases: stats.releases,
        },
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

/// Defaults, then the config file, then environment, then flags; validated once at the end.
fn resolve_config(settings: &SettingsArgs) -> Result<CacheConfig> {
    let mut config = match &settings.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let default_path = CacheConfig::default_config_path();
            if default_path.is_file() {
                debug!("using config {}", default_path.display());
                CacheConfig::from_file(&default_path).with_context(|| {
                    format!("failed to load config {}", default_path.display())
                })?
            } else {
                CacheConfig::default()
            }
        }
    };

    config = config.apply_env().context("invalid environment configuration")?;

    if let Some(budget) = settings.budget {
        config.budget_mb = budget;
    }
    if let Some(threshold) = settings.threshold {
        config.warning_threshold = threshold;
    }
    if let Some(max_dimension) = settings.max_dimension {
        config.max_texture_dimension = max_dimension;
    }

    config.validate()?;
    Ok(config)
}

fn pressure_label(pressure: MemoryPressure) -> &'static str {
    match pressure {
        MemoryPressure::Low => "low",
        MemoryPressure::Moderate => "moderate",
        MemoryPressure::High => "high",
        MemoryPressure::Critical => "critical",
    }
}

/// Stand-in texture with no GPU allocation behind it
#[derive(Debug)]
struct SyntheticTexture {
    key: String,
    dimension: u32,
}

impl GpuResource for SyntheticTexture {
    fn dispose(&self) {
        debug!("dispose {} ({}px)", self.key, self.dimension);
    }
}

struct SyntheticLoader {
    platform_max: u32,
}

impl TextureLoader for SyntheticLoader {
    type Resource = SyntheticTexture;
    type Error = Infallible;

    fn capabilities(&self) -> LoaderCapabilities {
        LoaderCapabilities::new(self.platform_max)
    }

    fn load(&self, key: &str, dimension: u32) -> Result<SyntheticTexture, Infallible> {
        Ok(SyntheticTexture { key: key.to_string(), dimension })
    }
}
