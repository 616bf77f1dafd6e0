// Integration tests for CLI commands
// These run the built binary and never reach Telegram or AnkiWeb.

use std::process::Command;
use tempfile::TempDir;

fn anker() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_anker"));
    command
        .env_remove("ANKER_PEPPER_KEY")
        .env_remove("ANKER_BOT_TOKEN")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn test_cli_help() {
    let output = anker().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("generate-key"));
    assert!(stdout.contains("verify"));
    assert!(stdout.contains("version"));
}

#[test]
fn test_cli_version() {
    let output = anker().arg("version").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("anker"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_generate_key_prints_hex() {
    let output = anker()
        .arg("generate-key")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let key = stdout.trim();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_cli_verify_reports_missing_secrets() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let output = anker()
        .args(["verify", "--config"])
        .arg(&config_path)
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pepper key"));
    assert!(stdout.contains("ANKER_PEPPER_KEY"));
}

#[test]
fn test_cli_verify_passes_with_secrets() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let key_path = temp_dir.path().join("pepper.key");
    std::fs::write(&key_path, "ab".repeat(32)).unwrap();

    let output = anker()
        .args(["verify", "--config"])
        .arg(&config_path)
        .arg("--key-file")
        .arg(&key_path)
        .env("ANKER_BOT_TOKEN", "123456:ABCdefGhIJKlmNoPQRsTUVwxyZ012345")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
}

#[test]
fn test_cli_run_without_token_fails_fast() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let key_path = temp_dir.path().join("pepper.key");
    std::fs::write(&key_path, "ab".repeat(32)).unwrap();

    let output = anker()
        .args(["run", "--config"])
        .arg(&config_path)
        .arg("--key-file")
        .arg(&key_path)
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ANKER_BOT_TOKEN"));
    assert!(config_path.exists());
}

#[test]
fn test_cli_unknown_command_fails() {
    let output = anker().arg("register").output().expect("Failed to execute command");

    assert!(!output.status.success());
}
