use anyhow::Result;
use devpulse_ingest::{build_adapter, IngestionAdapter};
use devpulse_store::sqlite::SqliteStore;
use devpulse_store::SnapshotStore;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use devpulse_server::benchmark_seed;
use devpulse_server::config::{self, ServerConfig};
use devpulse_server::refresh::{RefreshOrchestrator, RefreshTarget};
use devpulse_server::scheduler::RefreshScheduler;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  devpulse-server [config.toml]                                  Start the refresh daemon");
    eprintln!("  devpulse-server init-benchmarks <config.toml> [seed.json]      Initialize benchmarks (built-in defaults when seed omitted)");
    eprintln!("  devpulse-server add-entity <config.toml> <kind> <key>          Register an entity and run its first refresh");
    eprintln!("  devpulse-server refresh <config.toml> [key]                    Run one refresh cycle (whole fleet when key omitted)");
    eprintln!("  devpulse-server freshness <config.toml>                        Show data age per tracked entity");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("devpulse=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-benchmarks") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-benchmarks requires <config.toml> argument")
            })?;
            run_init_benchmarks(config_path, args.get(3).map(String::as_str)).await
        }
        Some("add-entity") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("add-entity requires <config.toml>, <kind>, and <key> arguments")
            })?;
            let kind = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("add-entity requires <kind> (repository or sprint) argument")
            })?;
            let key = args.get(4).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("add-entity requires <key> argument")
            })?;
            run_add_entity(config_path, kind, key).await
        }
        Some("refresh") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("refresh requires <config.toml> argument")
            })?;
            run_refresh(config_path, args.get(3).map(String::as_str)).await
        }
        Some("freshness") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("freshness requires <config.toml> argument")
            })?;
            run_freshness(config_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn build_components(
    config: &ServerConfig,
) -> Result<(Arc<dyn SnapshotStore>, Arc<RefreshOrchestrator>)> {
    devpulse_common::id::init(config.machine_id, config.node_id);

    let store: Arc<dyn SnapshotStore> = Arc::new(SqliteStore::new(Path::new(&config.data_dir))?);
    let adapter: Arc<dyn IngestionAdapter> =
        Arc::from(build_adapter(&config.ingest.source, config.ingest.fixture.clone())?);

    let orchestrator = Arc::new(RefreshOrchestrator::new(
        store.clone(),
        adapter,
        config.refresh.window_days,
        config.refresh.stale_threshold_hours,
    ));
    Ok((store, orchestrator))
}

/// Run the refresh daemon until interrupted.
async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;

    tracing::info!(
        data_dir = %config.data_dir,
        source = %config.ingest.source,
        interval_secs = config.refresh.interval_secs,
        window_days = config.refresh.window_days,
        "devpulse-server starting"
    );

    let (store, orchestrator) = build_components(&config)?;

    // Seed default benchmarks (only when DB has none)
    if let Err(e) = benchmark_seed::init_default_benchmarks(store.as_ref()) {
        tracing::error!(error = %e, "Failed to initialize default benchmarks");
    }

    let scheduler_handle = if config.refresh.enabled {
        let scheduler = RefreshScheduler::new(orchestrator.clone(), config.refresh.interval_secs);
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("Refresh scheduler disabled");
        None
    };

    tracing::info!("Server started");
    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    if let Some(h) = scheduler_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// Initialize benchmarks.
/// - With `seed_path`: import benchmarks from JSON seed file
/// - Without `seed_path`: seed built-in defaults when the DB has none
async fn run_init_benchmarks(config_path: &str, seed_path: Option<&str>) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;
    devpulse_common::id::init(config.machine_id, config.node_id);
    let store = SqliteStore::new(Path::new(&config.data_dir))?;
    if let Some(path) = seed_path {
        benchmark_seed::init_from_seed_file(&store, path)?;
    } else {
        benchmark_seed::init_default_benchmarks(&store)?;
    }
    Ok(())
}

/// Register one entity and refresh it immediately.
async fn run_add_entity(config_path: &str, kind: &str, key: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;
    let kind = kind
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{e} (expected repository or sprint)"))?;

    let (store, orchestrator) = build_components(&config)?;
    if let Err(e) = benchmark_seed::init_default_benchmarks(store.as_ref()) {
        tracing::error!(error = %e, "Failed to initialize default benchmarks");
    }

    let entity = orchestrator.bootstrap_entity(kind, key).await?;
    match store.latest_report(&entity.id)? {
        Some(report) => tracing::info!(
            entity = %entity.natural_key,
            score = report.overall_score,
            status = %report.overall_status,
            "Entity added and refreshed"
        ),
        None => tracing::warn!(entity = %entity.natural_key, "Entity added but no report was produced"),
    }
    Ok(())
}

/// Run one refresh cycle and exit.
async fn run_refresh(config_path: &str, key: Option<&str>) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;
    let (store, orchestrator) = build_components(&config)?;
    if let Err(e) = benchmark_seed::init_default_benchmarks(store.as_ref()) {
        tracing::error!(error = %e, "Failed to initialize default benchmarks");
    }

    let target = match key {
        Some(key) => RefreshTarget::Entity(key.to_string()),
        None => RefreshTarget::All,
    };
    let summary = orchestrator.force_refresh(target).await?;
    tracing::info!(
        discovered = summary.discovered,
        refreshed = summary.refreshed,
        failed = summary.failed,
        "Refresh completed"
    );
    Ok(())
}

/// Print data age per tracked entity.
#[allow(clippy::print_stdout)]
async fn run_freshness(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;
    let (_store, orchestrator) = build_components(&config)?;

    let rows = orchestrator.data_freshness()?;
    if rows.is_empty() {
        println!("No tracked entities.");
        return Ok(());
    }

    println!("{:<36} {:<12} {:<22} {:>10}  STALE", "ENTITY", "KIND", "LAST SCAN", "AGE (H)");
    for row in rows {
        let last_scan = row
            .last_scan_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let age = if row.data_age_hours.is_finite() {
            format!("{:.1}", row.data_age_hours)
        } else {
            "inf".to_string()
        };
        println!(
            "{:<36} {:<12} {:<22} {:>10}  {}",
            row.natural_key,
            row.kind.to_string(),
            last_scan,
            age,
            if row.stale { "yes" } else { "no" }
        );
    }
    Ok(())
}
