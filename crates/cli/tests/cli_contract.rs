use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// A command isolated from the caller's environment and config directory.
fn orrery(config_home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("orrery-cli");
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("ORRERY_TEXTURE_BUDGET_MB")
        .env_remove("ORRERY_TEXTURE_WARN_THRESHOLD")
        .env_remove("ORRERY_MAX_TEXTURE_SIZE")
        .env_remove("RUST_LOG");
    cmd
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("scene.txt");
    fs::write(&path, body).expect("script should be written");
    path
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

fn approx(value: &Value, expected: f64) -> bool {
    (value.as_f64().expect("number expected") - expected).abs() < 0.01
}

#[test]
fn estimate_reports_full_size_cost() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let value = json_stdout(orrery(temp.path()).arg("estimate"));

    assert_eq!(value["platform_max"], 16384);
    assert_eq!(value["dimension"], 2048);
    assert_eq!(value["estimated_bytes"], 22_313_697);
    assert!(approx(&value["estimated_mb"], 21.28));
    assert!(approx(&value["budget_mb"], 300.0));
    assert_eq!(value["textures_before_near_limit"], 11);
}

#[test]
fn estimate_respects_small_platform_limit() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let value = json_stdout(orrery(temp.path()).args(["estimate", "--platform-max", "1024"]));

    assert_eq!(value["dimension"], 1024);
    assert_eq!(value["estimated_bytes"], 5_578_424);
}

#[test]
fn estimate_accepts_max_size_flag() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let value = json_stdout(orrery(temp.path()).args(["estimate", "--max-size", "1024"]));

    assert_eq!(value["platform_max"], 1024);
    assert_eq!(value["dimension"], 1024);
    assert_eq!(value["estimated_bytes"], 5_578_424);
}

#[test]
fn simulate_accepts_max_size_flag() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a\n");

    let value = json_stdout(
        orrery(temp.path()).arg("simulate").arg(&script).args(["--max-size", "512"]),
    );

    assert_eq!(value["summary"]["memory_used_bytes"], 1_394_606);
}

#[test]
fn flag_overrides_invalid_env_value() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a\n");

    let value = json_stdout(
        orrery(temp.path())
            .env("ORRERY_TEXTURE_WARN_THRESHOLD", "1.5")
            .arg("simulate")
            .arg(&script)
            .args(["--threshold", "0.5"]),
    );

    assert!(approx(&value["budget_mb"], 300.0));
    assert!(approx(&value["warning_mb"], 150.0));
}

#[test]
fn invalid_env_value_without_override_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a\n");

    orrery(temp.path())
        .env("ORRERY_TEXTURE_WARN_THRESHOLD", "1.5")
        .arg("simulate")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("warning_threshold"));
}

#[cfg(target_os = "linux")]
#[test]
fn invalid_default_config_file_names_its_path() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config_dir = temp.path().join("orrery");
    fs::create_dir_all(&config_dir).expect("config dir should be created");
    fs::write(config_dir.join("texture-cache.toml"), "warning_threshold = 2.0\n")
        .expect("config should be written");

    orrery(temp.path())
        .arg("estimate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"))
        .stderr(predicate::str::contains("texture-cache.toml"));
}

#[test]
fn simulate_flags_near_limit_on_twelfth_texture() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let body: String = (0..12).map(|i| format!("acquire planet-{i}.jpg\n")).collect();
    let script = write_script(temp.path(), &body);

    let value = json_stdout(orrery(temp.path()).arg("simulate").arg(&script));

    let steps = value["steps"].as_array().expect("steps should be an array");
    assert_eq!(steps.len(), 12);
    assert_eq!(steps[10]["near_limit"], false);
    assert_eq!(steps[11]["near_limit"], true);
    assert_eq!(value["summary"]["texture_count"], 12);
    assert_eq!(value["summary"]["pressure"], "high");
}

#[test]
fn simulate_release_and_reacquire() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(
        temp.path(),
        "# re-entry\nacquire a\nacquire b\nacquire b\nrelease a\nrelease missing\nacquire a\n",
    );

    let value = json_stdout(orrery(temp.path()).arg("simulate").arg(&script));

    let outcomes: Vec<&str> = value["steps"]
        .as_array()
        .expect("steps should be an array")
        .iter()
        .map(|step| step["outcome"].as_str().expect("outcome should be a string"))
        .collect();
    assert_eq!(outcomes, ["loaded", "loaded", "cached", "released", "absent", "loaded"]);
    assert_eq!(value["steps"][0]["line"], 2);

    let summary = &value["summary"];
    assert_eq!(summary["keys"], serde_json::json!(["a", "b"]));
    assert_eq!(summary["memory_used_bytes"], 2 * 22_313_697u64);
    assert_eq!(summary["hits"], 1);
    assert_eq!(summary["loads"], 3);
    assert_eq!(summary["releases"], 1);
}

#[test]
fn simulate_clear_resets_to_zero() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a 512\nacquire b\nclear\n");

    let value = json_stdout(orrery(temp.path()).arg("simulate").arg(&script));

    assert_eq!(value["steps"][2]["outcome"], "cleared");
    assert_eq!(value["summary"]["memory_used_bytes"], 0);
    assert_eq!(value["summary"]["texture_count"], 0);
    assert_eq!(value["summary"]["pressure"], "low");
}

#[test]
fn simulate_uses_config_file_and_flags() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("cache.toml");
    fs::write(&config, "budget_mb = 50.0\nmax_texture_dimension = 1024\n")
        .expect("config should be written");
    let script = write_script(temp.path(), "acquire a\n");

    let value = json_stdout(
        orrery(temp.path())
            .arg("simulate")
            .arg(&script)
            .arg("--config")
            .arg(&config)
            .args(["--threshold", "0.5"]),
    );

    assert!(approx(&value["budget_mb"], 50.0));
    assert!(approx(&value["warning_mb"], 25.0));
    assert_eq!(value["summary"]["memory_used_bytes"], 5_578_424);
}

#[test]
fn simulate_reads_budget_from_env() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a\n");

    let value = json_stdout(
        orrery(temp.path())
            .env("ORRERY_TEXTURE_BUDGET_MB", "25")
            .arg("simulate")
            .arg(&script),
    );

    assert!(approx(&value["budget_mb"], 25.0));
    assert_eq!(value["summary"]["near_limit"], true);
}

#[test]
fn simulate_rejects_unknown_command() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a\nevict a\n");

    orrery(temp.path())
        .arg("simulate")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn simulate_rejects_invalid_threshold() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), "acquire a\n");

    orrery(temp.path())
        .arg("simulate")
        .arg(&script)
        .args(["--threshold", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("warning_threshold"));
}

#[test]
fn simulate_missing_script_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    orrery(temp.path())
        .arg("simulate")
        .arg(temp.path().join("absent.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read script"));
}

#[test]
fn version_prints_package_version() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    orrery(temp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
