//! Acquire/release scripts replayed by `orrery-cli simulate`
//!
//! One command per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! acquire textures/earth.jpg
//! acquire textures/moon.jpg 1024
//! release textures/earth.jpg
//! clear
//! ```
//!
//! The optional number after an acquire key is the platform-reported
//! maximum texture size for that request.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Acquire { key: String, platform_max: Option<u32> },
    Release { key: String },
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 1-based line number in the script
    pub line: usize,
    pub command: Command,
}

pub fn parse(source: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let mut words = text.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let command = match verb {
            "acquire" => {
                let key = expect_key(words.next(), verb, line)?;
                let platform_max = words
                    .next()
                    .map(|size| {
                        size.parse::<u32>().with_context(|| {
                            format!("line {line}: invalid texture size {size:?}")
                        })
                    })
                    .transpose()?;
                Command::Acquire { key, platform_max }
            }
            "release" => Command::Release {
                key: expect_key(words.next(), verb, line)?,
            },
            "clear" => Command::Clear,
            other => bail!("line {line}: unknown command {other:?}"),
        };

        if let Some(extra) = words.next() {
            bail!("line {line}: unexpected argument {extra:?}");
        }

        steps.push(Step { line, command });
    }

    Ok(steps)
}

fn expect_key(word: Option<&str>, verb: &str, line: usize) -> Result<String> {
    match word {
        Some(key) => Ok(key.to_string()),
        None => bail!("line {line}: {verb} needs a key"),
    }
}
