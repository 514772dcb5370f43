//! Async handle around [`EngineState`].
//!
//! The ticker task and every command take the same mutex, so a tick and a
//! command never interleave and readers never see a half-applied tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::advisor::{self, Advice, AdvisorClient};
use crate::engine::{EngineSnapshot, EngineState};
use crate::error::Result;
use crate::types::{BotDraft, Notification, StrategyUpdate};

/// Pairs handed to the advisor.
const ADVISOR_PAIRS: usize = 3;

pub struct EngineHandle {
    state: Arc<Mutex<EngineState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Spawn the ticker. The first tick fires one full `period` after start.
    pub fn start(state: EngineState, period: Duration) -> Self {
        // tokio intervals panic on a zero period
        let period = period.max(Duration::from_millis(1));
        let state = Arc::new(Mutex::new(state));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let ticker = tokio::spawn(run_ticker(Arc::clone(&state), period, shutdown_rx));
        log::info!("tick engine started, period {:?}", period);

        Self {
            state,
            shutdown_tx: Some(shutdown_tx),
            ticker: Some(ticker),
        }
    }

    pub fn state(&self) -> Arc<Mutex<EngineState>> {
        Arc::clone(&self.state)
    }

    pub async fn toggle_bot(&self, id: &str) -> Result<Notification> {
        self.state.lock().await.toggle_bot(id)
    }

    pub async fn save_strategy(&self, id: &str, update: StrategyUpdate) -> Result<Notification> {
        self.state.lock().await.save_strategy(id, update)
    }

    pub async fn deposit_credits(&self) -> Result<Notification> {
        self.state.lock().await.deposit_credits()
    }

    pub async fn engage_panic(&self) -> Notification {
        self.state.lock().await.engage_panic()
    }

    pub async fn disengage_panic(&self) -> Notification {
        self.state.lock().await.disengage_panic()
    }

    pub async fn create_bot(&self, draft: BotDraft) -> String {
        self.state.lock().await.create_bot(draft)
    }

    pub async fn inject_fault(&self, id: &str, reason: &str) -> Result<Notification> {
        self.state.lock().await.inject_fault(id, reason)
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn take_notifications(&self) -> Vec<Notification> {
        self.state.lock().await.take_notifications()
    }

    /// Ask the advisor about the leading pairs. The lock is released before
    /// the request goes out; any advisor failure degrades to `Unavailable`.
    pub async fn advice(&self, client: Option<&AdvisorClient>) -> Advice {
        let pairs: Vec<_> = {
            let state = self.state.lock().await;
            state.pairs().iter().take(ADVISOR_PAIRS).cloned().collect()
        };
        advisor::recommend(client, &pairs).await
    }

    /// Cancel the pending tick, wait for the ticker to exit, then persist
    /// everything once more.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(ticker) = self.ticker.take() {
            if let Err(e) = ticker.await {
                log::error!("ticker task ended abnormally: {}", e);
            }
        }
        let mut state = self.state.lock().await;
        state.persist_all()?;
        log::info!("engine state persisted, shutdown complete");
        Ok(())
    }
}

async fn run_ticker(
    state: Arc<Mutex<EngineState>>,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("tick engine stopping");
                break;
            }
            _ = interval.tick() => {
                let mut engine = state.lock().await;
                let report = engine.tick();
                log::debug!(
                    "tick: candidate={:?} fee={:?} paused={}",
                    report.candidate,
                    report.fee.as_ref().map(|f| f.amount),
                    report.paused_for_credits
                );
            }
        }
    }
}
