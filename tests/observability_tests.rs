mod common;

use common::env_from;
use service_kit::config::LoggerSettings;
use service_kit::observability::{
    init_logging, mask_sensitive, HttpMetrics, LatencyTimer, LogConfig, LogFormat, LogOutput,
};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_log_config_default() {
    let config = LogConfig::default();
    assert_eq!(config.level, "info");
    assert_eq!(config.output, LogOutput::Stdout);
    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_target);
    assert!(config.include_file);
    assert!(config.include_line);
}

#[test]
fn test_log_config_presets() {
    let dev = LogConfig::development();
    assert_eq!(dev.level, "debug");
    assert_eq!(dev.format, LogFormat::Console);

    let prod = LogConfig::production();
    assert_eq!(prod.format, LogFormat::Json);
    assert_eq!(prod.filter_directive(), "info");
}

#[test]
fn test_log_config_from_env() {
    let config = LogConfig::from_env(env_from(&[
        ("LOG_LEVEL", "WARN"),
        ("LOG_OUTPUT", "stderr"),
        ("LOG_FORMAT", "json"),
    ]));
    assert_eq!(config.filter_directive(), "warn");
    assert_eq!(config.output, LogOutput::Stderr);
    assert_eq!(config.format, LogFormat::Json);
}

#[test]
fn test_dev_env_forces_console() {
    let config = LogConfig::from_env(env_from(&[("LOG_FORMAT", "json"), ("ENV", "development")]));
    assert_eq!(config.format, LogFormat::Console);

    let config = LogConfig::from_env(env_from(&[("ENV", "production")]));
    assert_eq!(config.format, LogFormat::Json);
}

#[test]
fn test_dev_env_switch_applies_to_settings() {
    let settings = LoggerSettings {
        level: "info".to_string(),
        output_path: "stdout".to_string(),
        format: "json".to_string(),
    };

    let config = LogConfig::from(&settings).with_env_switch(env_from(&[("ENV", "dev")]));
    assert_eq!(config.format, LogFormat::Console);
    assert_eq!(config.level, "info");

    let config = LogConfig::from(&settings).with_env_switch(env_from(&[("ENV", "staging")]));
    assert_eq!(config.format, LogFormat::Json);
}

#[test]
fn test_unknown_level_falls_back_to_info() {
    let config = LogConfig::from_env(env_from(&[("LOG_LEVEL", "verbose")]));
    assert_eq!(config.filter_directive(), "info");
}

#[test]
fn test_log_config_from_settings() {
    let settings = LoggerSettings {
        level: "error".to_string(),
        output_path: "/tmp/service.log".to_string(),
        format: "console".to_string(),
    };
    let config = LogConfig::from(&settings);
    assert_eq!(config.filter_directive(), "error");
    assert_eq!(config.output, LogOutput::File(PathBuf::from("/tmp/service.log")));
    assert_eq!(config.format, LogFormat::Console);
}

#[test]
fn test_init_logging_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig {
        output: LogOutput::File(dir.path().join("service.log")),
        ..LogConfig::default()
    };

    // Only the first subscriber in a process can be installed.
    let first = init_logging(&config);
    let second = init_logging(&config);
    assert!(first.is_ok());
    assert!(second.is_err());
}

#[test]
fn test_init_logging_unwritable_file() {
    let config = LogConfig {
        output: LogOutput::File(PathBuf::from("/nonexistent-dir/service.log")),
        ..LogConfig::default()
    };
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_mask_sensitive() {
    assert_eq!(mask_sensitive("abc", 2), "***");
    assert_eq!(mask_sensitive("1234567890", 2), "12******90");
    assert_eq!(mask_sensitive("secret", 0), "******");
}

#[test]
fn test_metrics_registries_are_independent() {
    let a = HttpMetrics::new().unwrap();
    let b = HttpMetrics::new().unwrap();

    a.record_http_request("GET", "/boards", 200, Duration::from_millis(12));

    assert!(a.render().contains("http_requests_total"));
    assert!(!b.render().contains(r#"path="/boards""#));
}

#[test]
fn test_in_flight_gauge() {
    let metrics = HttpMetrics::with_prefix("chat").unwrap();
    metrics.request_started();
    metrics.request_started();
    metrics.request_finished();

    let exposition = metrics.render();
    let value: f64 = exposition
        .lines()
        .find(|line| line.starts_with("chat_http_requests_in_flight "))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|raw| raw.parse().ok())
        .unwrap();
    assert_eq!(value, 1.0);
}

#[test]
fn test_latency_timer() {
    let timer = LatencyTimer::new();
    std::thread::sleep(Duration::from_millis(5));
    assert!(timer.elapsed() >= Duration::from_millis(5));
    assert!(timer.elapsed_ms() >= 5.0);
}
