use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use gb_wind_forecaster::{config, controller, forecast, ml, repo, telemetry};
use config::Config;
use controller::ForecastController;
use ml::{DirectoryRegistry, InMemoryRegistry, ModelRegistry};
use telemetry::init_tracing;
use tracing::{info, warn};

const USAGE: &str = "usage: gb-wind-forecaster [run|train|cycle|models]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    if !matches!(command.as_str(), "run" | "train" | "cycle" | "models") {
        anyhow::bail!("unknown command {:?}; {}", command, USAGE);
    }

    let cfg = Config::load()?;

    let store = repo::InMemoryStore::from_snapshot_dir(&cfg.data.dir)
        .await
        .with_context(|| format!("failed to load store snapshot from {}", cfg.data.dir))?;
    let stores = repo::Stores::from_memory(store);

    let registry: Arc<dyn ModelRegistry> = match cfg.registry.dir.as_deref() {
        Some(dir) => Arc::new(DirectoryRegistry::open(dir).await?),
        None => {
            warn!("registry.dir not set, models live only for this process");
            Arc::new(InMemoryRegistry::new())
        }
    };

    let feed = Arc::new(forecast::ElexonWindForecastFeed::new(&cfg.comparator)?);
    let controller = ForecastController::new(cfg.clone(), stores, registry.clone(), feed);

    match command.as_str() {
        "train" => {
            let report = controller.train().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "models" => {
            let models = registry.list().await?;
            println!("{}", serde_json::to_string_pretty(&models)?);
        }
        "cycle" => {
            let report = controller.run_cycle(Utc::now()).await?;
            if let Some(path) = controller.persist_report(&report).await? {
                info!(path = %path.display(), "wrote cycle report");
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            if registry.list().await?.is_empty() {
                info!("registry empty, training before the first cycle");
                let report = controller.train().await?;
                if report.trained.is_empty() {
                    warn!(skipped = report.skipped.len(), "no farm could be trained");
                }
            }
            info!(
                cadence_minutes = cfg.realtime.cadence_minutes,
                "starting GB wind forecaster"
            );
            controller.run(telemetry::shutdown_signal()).await?;
        }
    }

    info!("shutdown complete");
    Ok(())
}
