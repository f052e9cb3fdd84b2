//! Point d'entrée de PMOPodcast
//!
//! Deux modes :
//! - `pmopodcast once`  : une découverte complète, résumé JSON sur stdout
//! - `pmopodcast serve` : planificateur périodique + API HTTP de contrôle

mod api;

use std::sync::Arc;
use std::time::Duration;

use pmoconfig::get_config;
use pmodispatch::Router;
use pmopending::{PendingConfigExt, QueueModule, SqlitePendingStore};
use pmopipeline::{Pipeline, PipelineConfigExt, Scheduler};
use pmoscorer::{LlmScorer, ScorerModule};
use pmospotify::{CatalogModule, SpotifyCatalog};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &pmoconfig::Config) {
    let default_level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());
    let filter = EnvFilter::try_from_env("PMOPODCAST_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Construit le routeur et le pipeline à partir de la configuration
///
/// Les credentials manquants font échouer la construction : c'est l'erreur
/// de configuration fatale, détectée avant toute exécution.
fn build_pipeline(config: &pmoconfig::Config) -> anyhow::Result<(Arc<Router>, Arc<Pipeline>)> {
    info!("📡 Initializing capability modules...");

    let catalog = Arc::new(SpotifyCatalog::from_config(config)?);
    let scorer = Arc::new(LlmScorer::from_config(config)?);
    let store = Arc::new(SqlitePendingStore::new(&config.pending_db_path())?);

    let mut router = Router::new();
    router.register_module(Arc::new(CatalogModule::new(catalog)?))?;
    router.register_module(Arc::new(ScorerModule::new(scorer)?))?;
    router.register_module(Arc::new(QueueModule::new(store)?))?;
    let router = Arc::new(router);

    for description in router.describe_all() {
        info!(
            "  - {} v{} ({} operations, {} resources)",
            description.name,
            description.version,
            description.operations.len(),
            description.resources.len()
        );
    }

    let settings = config.pipeline_settings()?;
    let preferences = config.get_preferences()?;
    info!("✅ {} preference(s) configured", preferences.len());

    let pipeline = Arc::new(Pipeline::new(router.clone(), settings, preferences));
    Ok((router, pipeline))
}

async fn run_once(pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    // D'abord vider ce qui peut l'être, puis découvrir
    let drain = pipeline.drain().await?;
    if drain.attempted > 0 {
        info!(queued = drain.queued, remaining = drain.remaining, "Pending queue drained");
    }

    let summary = pipeline.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(config: &pmoconfig::Config, router: Arc<Router>, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let interval_minutes = config.get_check_interval_minutes()?;
    let scheduler = Scheduler::spawn(
        pipeline.clone(),
        Duration::from_secs(interval_minutes * 60),
    );

    let port = config.get_http_port();
    let app = api::build_router(api::ApiState::new(router, pipeline));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Control API listening on port {}", port);

    info!("✅ PMOPodcast is ready!");
    info!("Press Ctrl+C to stop...");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    scheduler.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();
    init_tracing(&config);

    let mode = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());

    let (router, pipeline) = build_pipeline(&config)?;

    match mode.as_str() {
        "once" => run_once(pipeline).await,
        "serve" => serve(&config, router, pipeline).await,
        other => {
            eprintln!("Unknown mode '{}': expected 'serve' or 'once'", other);
            std::process::exit(2);
        }
    }
}
