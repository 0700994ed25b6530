//! Integration tests for environment-driven configuration.

use std::env;
use std::io::Write;
use std::time::Duration;

use rust_dbload::backend::OperationKind;
use rust_dbload::config::{Config, ConfigError};
use rust_dbload::pool::ProfileSource;
use rust_dbload::profile::Profile;
use serial_test::serial;
use tempfile::NamedTempFile;

/// Clear all env vars that could affect config parsing.
fn clean_env() {
    for var in [
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASS",
        "DB_NAME",
        "DB_CONNECT_TIMEOUT",
        "LOAD_WORKERS",
        "LOAD_STATUS_URL",
        "LOAD_PROFILE",
        "LOW_OPS_PER_SEC",
        "MED_OPS_PER_SEC",
        "HIGH_OPS_PER_SEC",
        "MIX_TABLE_FILE",
        "PROFILE_POLL_INTERVAL",
        "PROFILE_FETCH_TIMEOUT",
        "SHUTDOWN_GRACE",
        "RUN_DURATION",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clean_env();
    let config = Config::from_env().unwrap();

    assert_eq!(config.db.host, "localhost");
    assert_eq!(config.db.port, 3307);
    assert_eq!(config.db.user, "appuser");
    assert_eq!(config.db.database, "appdb");
    assert_eq!(config.db.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.worker_count, 5);
    assert_eq!(config.status_url, "http://auth-svc:8080/load/status");
    assert_eq!(config.fixed_profile, None);
    assert_eq!(config.rates.low, 200);
    assert_eq!(config.rates.med, 2000);
    assert_eq!(config.rates.high, 10000);
    assert_eq!(config.poll_interval, Duration::from_secs(2));
    assert_eq!(config.poll_timeout, Duration::from_secs(1));
    assert_eq!(config.shutdown_grace, Duration::from_secs(2));
    assert_eq!(config.run_duration, None);
    assert!(config.mix_table_file.is_none());

    match config.profile_source() {
        ProfileSource::Poll(poller) => {
            assert_eq!(poller.status_url, "http://auth-svc:8080/load/status");
            assert_eq!(poller.interval, Duration::from_secs(2));
        }
        other => panic!("expected polled profile, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_overrides() {
    clean_env();
    env::set_var("DB_HOST", "db.internal");
    env::set_var("DB_PORT", "3306");
    env::set_var("DB_USER", "loader");
    env::set_var("DB_PASS", "secret");
    env::set_var("DB_NAME", "shop");
    env::set_var("DB_CONNECT_TIMEOUT", "750ms");
    env::set_var("LOAD_WORKERS", "12");
    env::set_var("LOAD_STATUS_URL", "https://control.example.com/load/status");
    env::set_var("LOW_OPS_PER_SEC", "50");
    env::set_var("MED_OPS_PER_SEC", "500");
    env::set_var("HIGH_OPS_PER_SEC", "5000");
    env::set_var("PROFILE_POLL_INTERVAL", "500ms");
    env::set_var("PROFILE_FETCH_TIMEOUT", "250ms");
    env::set_var("SHUTDOWN_GRACE", "10s");
    env::set_var("RUN_DURATION", "5m");

    let config = Config::from_env().unwrap();
    assert_eq!(config.db.host, "db.internal");
    assert_eq!(config.db.port, 3306);
    assert_eq!(config.db.user, "loader");
    assert_eq!(config.db.password, "secret");
    assert_eq!(config.db.database, "shop");
    assert_eq!(config.db.connect_timeout, Duration::from_millis(750));
    assert_eq!(config.worker_count, 12);
    assert_eq!(config.rates.low, 50);
    assert_eq!(config.rates.med, 500);
    assert_eq!(config.rates.high, 5000);
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.poll_timeout, Duration::from_millis(250));
    assert_eq!(config.shutdown_grace, Duration::from_secs(10));
    assert_eq!(config.run_duration, Some(Duration::from_secs(300)));

    let pool = config.to_pool_config();
    assert_eq!(pool.worker_count, 12);
    assert_eq!(pool.rates, config.rates);

    clean_env();
}

#[test]
#[serial]
fn test_fixed_profile_disables_polling() {
    clean_env();
    env::set_var("LOAD_PROFILE", "High");

    let config = Config::from_env().unwrap();
    assert_eq!(config.fixed_profile, Some(Profile::High));
    assert_eq!(config.profile_source(), ProfileSource::Fixed(Profile::High));

    env::set_var("LOAD_PROFILE", "  ");
    let config = Config::from_env().unwrap();
    assert_eq!(config.fixed_profile, None);

    clean_env();
}

#[test]
#[serial]
fn test_unknown_fixed_profile_is_rejected() {
    clean_env();
    env::set_var("LOAD_PROFILE", "turbo");

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidProfile(_))
    ));

    clean_env();
}

#[test]
#[serial]
fn test_zero_workers_is_rejected() {
    clean_env();
    env::set_var("LOAD_WORKERS", "0");

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::MustBePositive("LOAD_WORKERS"))
    ));

    clean_env();
}

#[test]
#[serial]
fn test_non_numeric_values_are_rejected() {
    clean_env();
    env::set_var("LOAD_WORKERS", "many");
    match Config::from_env() {
        Err(ConfigError::InvalidNumber { var, value }) => {
            assert_eq!(var, "LOAD_WORKERS");
            assert_eq!(value, "many");
        }
        other => panic!("expected invalid number, got {:?}", other.map(|_| ())),
    }

    clean_env();
    env::set_var("HIGH_OPS_PER_SEC", "-5");
    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidNumber {
            var: "HIGH_OPS_PER_SEC",
            ..
        })
    ));

    clean_env();
}

#[test]
#[serial]
fn test_invalid_durations_are_rejected() {
    clean_env();
    env::set_var("PROFILE_POLL_INTERVAL", "2 fortnights");
    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidDuration {
            var: "PROFILE_POLL_INTERVAL",
            ..
        })
    ));

    clean_env();
    env::set_var("PROFILE_POLL_INTERVAL", "0s");
    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::MustBePositive("PROFILE_POLL_INTERVAL"))
    ));

    clean_env();
    env::set_var("PROFILE_FETCH_TIMEOUT", "0ms");
    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::MustBePositive("PROFILE_FETCH_TIMEOUT"))
    ));

    clean_env();
    env::set_var("RUN_DURATION", "soon");
    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidDuration {
            var: "RUN_DURATION",
            ..
        })
    ));

    clean_env();
}

#[test]
#[serial]
fn test_status_url_must_be_http() {
    clean_env();
    env::set_var("LOAD_STATUS_URL", "auth-svc:8080/load/status");

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidStatusUrl(_))
    ));

    clean_env();
}

#[test]
#[serial]
fn test_mix_table_file_is_loaded() {
    clean_env();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"
low:
  - { kind: insert, weight: 1 }
med:
  - { kind: insert, weight: 1 }
high:
  - { kind: probe, weight: 1 }
"#,
    )
    .unwrap();
    env::set_var("MIX_TABLE_FILE", file.path());

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.mix.select(Profile::Low, 0.5),
        Some(OperationKind::Insert)
    );
    assert_eq!(
        config.mix.select(Profile::High, 0.5),
        Some(OperationKind::Probe)
    );
    assert!(config.mix_table_file.is_some());

    clean_env();
}

#[test]
#[serial]
fn test_invalid_mix_table_file_is_rejected() {
    clean_env();
    env::set_var("MIX_TABLE_FILE", "/nonexistent/mix.yaml");

    match Config::from_env() {
        Err(ConfigError::MixTable { path, .. }) => assert_eq!(path, "/nonexistent/mix.yaml"),
        other => panic!("expected mix table error, got {:?}", other.map(|_| ())),
    }

    clean_env();
}
