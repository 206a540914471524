use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// Helper to get a Command for the `statline` binary, isolated from any
// config file on the machine running the tests.
fn statline() -> Command {
    let mut cmd = Command::cargo_bin("statline").expect("binary exists");
    cmd.env_remove("STATLINE_CONFIG")
        .env("XDG_CONFIG_HOME", "/nonexistent/statline-smoke")
        .env("NO_COLOR", "1");
    cmd
}

const JSON_STREAM: &str = "{\"version\":1}\n[\n[{\"full_text\":\"cpu\"},{\"full_text\":\"mem\"}]\n";

// -----------------------------------------------------------------------
// Basic CLI
// -----------------------------------------------------------------------

#[test]
fn help_shows_description() {
    statline()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status line driver"));
}

#[test]
fn version_shows_semver() {
    statline()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn no_args_shows_usage() {
    statline()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// -----------------------------------------------------------------------
// Parse
// -----------------------------------------------------------------------

#[test]
fn parse_plain_text_line() {
    statline()
        .args(["parse", "--no-color"])
        .write_stdin("battery 90%\n")
        .assert()
        .success()
        .stdout("battery 90%\n");
}

#[test]
fn parse_json_stream_as_text() {
    statline()
        .args(["parse", "--no-color"])
        .write_stdin(JSON_STREAM)
        .assert()
        .success()
        .stdout(predicate::str::contains("cpu | mem"));
}

#[test]
fn parse_json_stream_as_json() {
    statline()
        .args(["parse", "--format", "json"])
        .write_stdin(JSON_STREAM)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"full_text\":\"mem\""));
}

#[test]
fn parse_small_chunks_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stream.json");
    std::fs::write(&path, JSON_STREAM).unwrap();

    statline()
        .args(["parse", "--no-color", "--chunk-size", "3", "--input"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("cpu | mem"));
}

#[test]
fn parse_reports_malformed_json() {
    statline()
        .args(["parse", "--no-color"])
        .write_stdin("{\"version\":1}\n[[{\"full_text\" 1}]")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error: Could not parse JSON ("));
}

#[test]
fn parse_rejects_zero_chunk_size() {
    statline()
        .args(["parse", "--chunk-size", "0"])
        .write_stdin("x")
        .assert()
        .failure();
}

#[test]
fn parse_missing_input_file_fails() {
    statline()
        .args(["parse", "--input", "/nonexistent/statline-input"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// -----------------------------------------------------------------------
// Run
// -----------------------------------------------------------------------

#[test]
fn run_without_command_fails() {
    statline()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no status command"));
}

#[test]
fn run_plain_child_until_exit() {
    statline()
        .args(["run", "--no-color", "--no-commands", "--exit-with-child"])
        .args(["--command", "printf 'hello\\n'"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"))
        .stdout(predicate::str::contains(
            "status_command process exited unexpectedly (exit 0)",
        ));
}

#[test]
fn run_reports_missing_program() {
    statline()
        .args(["run", "--no-color", "--no-commands", "--exit-with-child"])
        .args(["--command", "/nonexistent/statline-status-command"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "not found or is missing a library dependency (exit 127)",
        ));
}

#[test]
fn run_json_child() {
    let command = format!("printf '{}'", JSON_STREAM.replace('\n', "\\n"));
    statline()
        .args(["run", "--no-color", "--no-commands", "--exit-with-child"])
        .args(["--command", &command])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("cpu | mem"));
}

#[test]
fn run_uses_command_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "status_command = \"echo from-config\"\ncolors = false\n").unwrap();

    statline()
        .args(["run", "--no-commands", "--exit-with-child", "--config"])
        .arg(&path)
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("from-config"));
}

#[test]
fn run_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "separator_symbol = \"\"\n").unwrap();

    statline()
        .args(["run", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config error"));
}
