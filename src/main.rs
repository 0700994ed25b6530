use std::env;
use std::sync::Arc;

use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_dbload::config::Config;
use rust_dbload::metrics::{gather_metrics_string, register_metrics};
use rust_dbload::mysql::MySqlBackend;
use rust_dbload::pool::LoadPool;

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Backend connection (read once at startup):");
    eprintln!("  DB_HOST                 - Database host (default: localhost)");
    eprintln!("  DB_PORT                 - Database port (default: 3307)");
    eprintln!("  DB_USER                 - Database user (default: appuser)");
    eprintln!("  DB_PASS                 - Database password (default: app123)");
    eprintln!("  DB_NAME                 - Database name (default: appdb)");
    eprintln!("  DB_CONNECT_TIMEOUT      - Connect timeout, e.g. 5s (default: 5s)");
    eprintln!();
    eprintln!("Load configuration:");
    eprintln!("  LOAD_WORKERS            - Number of concurrent workers (default: 5, must be > 0)");
    eprintln!(
        "  LOAD_STATUS_URL         - Profile status endpoint (default: http://auth-svc:8080/load/status)"
    );
    eprintln!("  LOAD_PROFILE            - off, low, med or high: fixed profile, disables polling");
    eprintln!("  LOW_OPS_PER_SEC         - Aggregate target for low (default: 200)");
    eprintln!("  MED_OPS_PER_SEC         - Aggregate target for med (default: 2000)");
    eprintln!("  HIGH_OPS_PER_SEC        - Aggregate target for high (default: 10000)");
    eprintln!("  MIX_TABLE_FILE          - YAML file with per-profile operation weights");
    eprintln!();
    eprintln!("Timing:");
    eprintln!("  PROFILE_POLL_INTERVAL   - Profile poll cadence (default: 2s)");
    eprintln!("  PROFILE_FETCH_TIMEOUT   - Profile fetch timeout (default: 1s)");
    eprintln!("  SHUTDOWN_GRACE          - Wait for workers on stop (default: 2s)");
    eprintln!("  RUN_DURATION            - Stop automatically after e.g. 10m (default: never)");
    eprintln!();
    eprintln!("Logging:");
    eprintln!("  RUST_LOG                - Log filter (default: info)");
    eprintln!("  LOG_FORMAT              - text or json (default: text)");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on Ctrl+C, SIGTERM, or once `run_duration` has elapsed.
async fn wait_for_stop(run_duration: Option<Duration>) {
    let run_limit = async {
        match run_duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => info!("Interrupt received"),
        _ = terminate => info!("SIGTERM received"),
        _ = run_limit => info!("Run duration completed"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    // Register Prometheus metrics
    register_metrics()?;

    // Load configuration from environment variables
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    config.print_summary();

    let backend = Arc::new(MySqlBackend::new(config.db.clone()));
    let pool = LoadPool::start(config.to_pool_config(), backend)?;

    wait_for_stop(config.run_duration).await;

    info!("Stopping...");
    let report = pool.shutdown(config.shutdown_grace).await;
    info!(
        finished = report.finished,
        aborted = report.aborted,
        "Shutdown complete"
    );

    let final_metrics_output = gather_metrics_string(prometheus::default_registry());
    println!("\n--- FINAL METRICS ---\n{}", final_metrics_output);
    println!("--- END OF FINAL METRICS ---\n");

    Ok(())
}
