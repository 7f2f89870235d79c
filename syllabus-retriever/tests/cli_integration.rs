use anyhow::Result;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Write a config that embeds locally and points at a port nothing listens on
fn write_offline_config(temp_dir: &TempDir) -> Result<PathBuf> {
    let path = temp_dir.path().join("syllabus.toml");
    std::fs::write(
        &path,
        r#"
embedding_provider = "hash"

[index]
url = "http://127.0.0.1:9"
collection = "cli_test"

[embedding]
dimension = 64
"#,
    )?;
    Ok(path)
}

/// Helper to run the CLI binary with given args
fn run_cli(config: &PathBuf, args: &[&str]) -> Result<std::process::Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_syllabus"));
    cmd.arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "error") // Reduce log noise
        .env_remove("QDRANT_URL")
        .env_remove("QDRANT_HOST")
        .env_remove("QDRANT_PORT")
        .env_remove("QDRANT_API_KEY")
        .env_remove("EMBEDDING_DIMENSION");

    let output = cmd.output()?;
    Ok(output)
}

#[test]
fn test_status_reports_disabled_index() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = write_offline_config(&temp_dir)?;

    let output = run_cli(&config, &["status", "--format", "json"])?;
    assert!(output.status.success(), "status should succeed when disabled");

    let status: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(status["state"], "disabled");
    assert_eq!(status["collection"], "cli_test");
    assert_eq!(status["dimension"], 64);
    assert_eq!(status["embedding_provider"], "hash");
    assert!(status["reason"].as_str().unwrap_or_default().contains("127.0.0.1:9"));

    let output = run_cli(&config, &["status"])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Index: disabled"));
    Ok(())
}

#[test]
fn test_materials_empty_when_disabled() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = write_offline_config(&temp_dir)?;

    let output = run_cli(&config, &["materials", "math"])?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).trim().is_empty());
    Ok(())
}

#[test]
fn test_add_fails_when_disabled() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = write_offline_config(&temp_dir)?;

    let output = run_cli(
        &config,
        &["add", "--subject", "math", "--text", "Derivatives measure rate of change."],
    )?;
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: Vector index not ready"));
    Ok(())
}

#[test]
fn test_search_and_delete_fail_when_disabled() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = write_offline_config(&temp_dir)?;

    for args in [
        vec!["search", "rate of change", "--subject", "math"],
        vec!["delete-document", "doc-1"],
        vec!["delete-subject", "math"],
    ] {
        let output = run_cli(&config, &args)?;
        assert!(!output.status.success(), "{args:?} should fail");
    }
    Ok(())
}

#[test]
fn test_invalid_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "embedding_provider = \"bert\"\n")?;

    let output = run_cli(&path, &["status"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
    Ok(())
}
