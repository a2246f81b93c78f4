use std::fs;

use ambit_config::ConfigLoader;
use ambit_model::ScopePolicy;

#[test]
fn missing_file_yields_defaults() {
    let config = ConfigLoader::new("/nonexistent/ambit.toml").load().unwrap();
    assert_eq!(config.bus.channel_capacity, 1024);
    assert_eq!(config.scope.default_policy, ScopePolicy::None);
    assert_eq!(config.scope.confidence_threshold, 0.6);
    assert_eq!(config.batch.max_size, 100);
    assert_eq!(config.node.max_parallelism, 1);
}

#[test]
fn file_overrides_defaults_and_tool_sections_parse() {
    let path = std::env::temp_dir().join(format!("ambit-loader-{}.toml", std::process::id()));
    fs::write(
        &path,
        r#"
[scope]
default_policy = "strict"
confidence_threshold = 0.8

[batch]
max_size = 250

[tools.gau]
min_size = 50
timeout_ms = 2000
"#,
    )
    .unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(config.scope.default_policy, ScopePolicy::Strict);
    assert_eq!(config.scope.confidence_threshold, 0.8);
    assert_eq!(config.batch.max_size, 250);
    // Untouched sections keep their defaults.
    assert_eq!(config.batch.min_size, 10);

    let gau = config.batch_for("gau");
    assert_eq!(gau.min_size, 50);
    assert_eq!(gau.timeout_ms, 2000);
    assert_eq!(gau.max_size, 250);
}
