use solsight::application::coordinator::PredictionCoordinator;
use solsight::config::Config;
use solsight::domain::ports::{ModelStore, PriceFeed};
use solsight::infrastructure::file_store::FileModelStore;
use solsight::infrastructure::sim_feed::SimulatedFeed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    info!(symbol = %config.symbol, "starting solsight engine");

    let store: Arc<dyn ModelStore> = Arc::new(FileModelStore::new(config.data_dir.clone()));
    let feed: Arc<dyn PriceFeed> = Arc::new(SimulatedFeed::new(
        config.history_capacity,
        Duration::from_secs(2),
    ));

    let (coordinator, mut snapshots) = PredictionCoordinator::new(config, store);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Consumer side: log every published snapshot change. A UI would hold
    // this receiver instead.
    let reporter = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow().clone();
            info!(
                state = %snapshot.state,
                signal = %snapshot.signal.signal_type,
                confidence = snapshot.signal.confidence,
                probability_up = ?snapshot.probability_up,
                accuracy = ?snapshot.metrics.map(|m| m.accuracy),
                "{}",
                snapshot.status
            );
        }
    });

    let engine = tokio::spawn(coordinator.run(feed, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, shutting down");
    let _ = shutdown_tx.send(true);

    engine.await??;
    reporter.abort();
    Ok(())
}
