#[cfg(test)]
mod cli {
    use assert_cmd::cargo::cargo_bin_cmd;
    use predicates::{
        prelude::PredicateBooleanExt,
        str::{contains, is_empty},
    };
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::{error::Error, fs, path::PathBuf};
    use tempfile::tempdir;

    type Result<T> = std::result::Result<T, Box<dyn Error>>;

    /// Exit codes of the `throttle` binary
    const SUCCESS: i32 = 0;
    const TASK_FAILURE: i32 = 2;
    const CONFIG_FILE: i32 = 3;

    fn fixtures_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("fixtures")
    }

    fn fixture(name: &str) -> String {
        fixtures_path().join(name).to_string_lossy().to_string()
    }

    #[test]
    fn test_help() {
        let mut cmd = cargo_bin_cmd!();
        cmd.arg("--help")
            .assert()
            .success()
            .stdout(contains("simulate").and(contains("services")));
    }

    #[test]
    fn test_services_builtin_profile() -> Result<()> {
        // No throttle.toml in an empty directory
        let dir = tempdir()?;
        let mut cmd = cargo_bin_cmd!();
        cmd.current_dir(dir.path())
            .arg("services")
            .assert()
            .success()
            .stdout(contains("claude").and(contains("gemini")))
            .stdout(contains("every     5s"))
            .stdout(contains("Retryable statuses: 429, 500, 503"));
        Ok(())
    }

    #[test]
    fn test_services_json() -> Result<()> {
        let mut cmd = cargo_bin_cmd!();
        let output = cmd
            .args(["--config", &*fixture("fast.toml"), "--format", "json", "services"])
            .output()?;
        assert_eq!(output.status.code(), Some(SUCCESS));

        let value: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(value["services"]["claude"]["interval_ms"], 100);
        assert_eq!(value["defaults"]["interval_ms"], 20);
        assert_eq!(value["retry"]["max_retries"], 2);
        Ok(())
    }

    #[test]
    fn test_default_config_file_is_picked_up() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("throttle.toml"),
            "[services.mistral]\nconcurrency = 3\n",
        )?;

        let mut cmd = cargo_bin_cmd!();
        cmd.current_dir(dir.path())
            .arg("services")
            .assert()
            .success()
            .stdout(contains("mistral").and(contains("gemini").not()));
        Ok(())
    }

    #[test]
    fn test_simulate_succeeds() {
        let mut cmd = cargo_bin_cmd!();
        cmd.args([
            "--config",
            &*fixture("fast.toml"),
            "simulate",
            "claude",
            "--tasks",
            "3",
            "--duration",
            "10ms",
        ])
        .assert()
        .code(SUCCESS)
        .stdout(contains("Simulating 3 tasks on claude"))
        .stdout(contains("3 succeeded, 0 failed"))
        .stdout(contains("Status: 0 active, 0 queued"));
    }

    #[test]
    fn test_simulate_failure_exit_code() {
        let mut cmd = cargo_bin_cmd!();
        cmd.args([
            "--config",
            &*fixture("fast.toml"),
            "simulate",
            "gemini",
            "--tasks",
            "4",
            "--duration",
            "5ms",
            "--fail-every",
            "2",
            "--status",
            "503",
        ])
        .assert()
        .code(TASK_FAILURE)
        .stdout(contains("2 succeeded, 2 failed"))
        .stdout(contains("failed: simulated failure of task 2 (status 503)"));
    }

    #[test]
    fn test_simulate_recovers_with_retry() -> Result<()> {
        let mut cmd = cargo_bin_cmd!();
        let output = cmd
            .args([
                "--config",
                &*fixture("fast.toml"),
                "--format",
                "json",
                "-qq",
                "simulate",
                "gemini",
                "--tasks",
                "4",
                "--duration",
                "5ms",
                "--fail-every",
                "2",
                "--retry",
            ])
            .env_remove("RUST_LOG")
            .output()?;
        assert_eq!(output.status.code(), Some(SUCCESS));
        assert!(output.stderr.is_empty());

        let value: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(value["failed"], 0);
        assert_eq!(value["tasks"][1]["attempts"], 2);
        assert_eq!(value["tasks"][3]["attempts"], 2);
        assert_eq!(value["stats"]["dispatched"], 6);
        Ok(())
    }

    #[test]
    fn test_retries_are_logged() {
        let mut cmd = cargo_bin_cmd!();
        cmd.args([
            "--config",
            &*fixture("fast.toml"),
            "simulate",
            "claude",
            "--tasks",
            "1",
            "--duration",
            "1ms",
            "--fail-every",
            "1",
            "--retry",
        ])
        .env_remove("RUST_LOG")
        .assert()
        .code(SUCCESS)
        .stderr(contains("[WARN]").and(contains("retrying in")));
    }

    #[test]
    fn test_command_line_overrides() -> Result<()> {
        let mut cmd = cargo_bin_cmd!();
        let output = cmd
            .args([
                "--config",
                &*fixture("fast.toml"),
                "--format",
                "json",
                "simulate",
                "claude",
                "--tasks",
                "2",
                "--duration",
                "1ms",
                "--concurrency",
                "2",
                "--interval",
                "0s",
            ])
            .output()?;
        assert_eq!(output.status.code(), Some(SUCCESS));

        let value: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(value["status"]["max_concurrent"], 2);
        assert_eq!(value["status"]["min_delay"], "0s");
        Ok(())
    }

    #[test]
    fn test_invalid_config_file() {
        let mut cmd = cargo_bin_cmd!();
        cmd.args(["--config", &*fixture("invalid.toml"), "services"])
            .env_remove("RUST_LOG")
            .assert()
            .code(CONFIG_FILE)
            .stdout(is_empty())
            .stderr(contains("Invalid concurrency for service claude"));
    }

    #[test]
    fn test_missing_config_file() {
        let mut cmd = cargo_bin_cmd!();
        cmd.args(["--config", "does-not-exist.toml", "services"])
            .env_remove("RUST_LOG")
            .assert()
            .code(CONFIG_FILE)
            .stderr(contains("does not exist"));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let mut cmd = cargo_bin_cmd!();
        cmd.args(["-v", "-q", "services"]).assert().failure().code(2);
    }
}
