use aegis_engine::advisor::{Advice, AdvisorClient};
use aegis_engine::monitor::PerformanceMonitor;
use aegis_engine::store::FileStore;
use aegis_engine::{Config, EngineHandle, EngineState};
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("aegis_engine=info"))
        .init();

    let config = Config::load().context("loading configuration")?;

    let store = FileStore::open(&config.state_dir)
        .with_context(|| format!("opening state dir {}", config.state_dir.display()))?;
    let state = EngineState::restore(&config, Box::new(store));

    let engine = EngineHandle::start(state, config.tick_interval());

    let monitor = PerformanceMonitor::new(engine.state());
    let monitor_task = monitor.start_monitoring(config.report_interval());

    let advisor = match config.advisor_url.as_deref() {
        Some(url) => match AdvisorClient::new(url, config.advisor_timeout()) {
            Ok(client) => Some(client),
            Err(e) => {
                log::warn!("advisor disabled: {}", e);
                None
            }
        },
        None => None,
    };
    match engine.advice(advisor.as_ref()).await {
        Advice::Recommendation(insights) => log::info!(
            "advisor: {} ({:.0}%) {}",
            insights.recommendation,
            insights.confidence,
            insights.reasoning
        ),
        Advice::Unavailable => log::info!("advisor: no recommendation available"),
    }

    tokio::signal::ctrl_c().await?;
    log::info!("received stop signal, shutting down");

    monitor_task.abort();
    engine.shutdown().await.context("final persist")?;

    Ok(())
}
