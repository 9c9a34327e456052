//! Environment variable overrides live in their own test binary so setting
//! process-wide variables cannot race other tests.

use rcon_relay::config::ConfigManager;
use rcon_relay::BatchPolicy;
use tempfile::TempDir;

#[test]
fn test_environment_variables_override_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("rcon-relay.toml"),
        r#"
[console]
host = "10.0.0.5"
port = 25575
password = "from-file"

[dispatch]
command_delay_ms = 80
"#,
    )
    .unwrap();

    std::env::set_var("RCON_RELAY__CONSOLE__PASSWORD", "from-env");
    std::env::set_var("RCON_RELAY__CONSOLE__PORT", "25580");
    std::env::set_var("RCON_RELAY__DISPATCH__BATCH_POLICY", "append");

    let result = ConfigManager::load_with(Some(dir.path().to_path_buf()), None, "test");

    std::env::remove_var("RCON_RELAY__CONSOLE__PASSWORD");
    std::env::remove_var("RCON_RELAY__CONSOLE__PORT");
    std::env::remove_var("RCON_RELAY__DISPATCH__BATCH_POLICY");

    let manager = result.unwrap();
    let config = manager.config();

    assert_eq!(config.console.host, "10.0.0.5");
    assert_eq!(config.console.password, "from-env");
    assert_eq!(config.console.port, 25580);
    assert_eq!(config.dispatch.command_delay_ms, 80);
    assert_eq!(config.dispatch.batch_policy, BatchPolicy::Append);
    assert_eq!(manager.environment(), "test");
}
