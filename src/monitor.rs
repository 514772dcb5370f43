use crate::engine::EngineState;
use crate::types::EntryKind;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct PerformanceMonitor {
    state: Arc<Mutex<EngineState>>,
}

impl PerformanceMonitor {
    pub fn new(state: Arc<Mutex<EngineState>>) -> Self {
        Self { state }
    }

    pub fn start_monitoring(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let report = self.generate_performance_report().await;
                self.print_report(&report);
            }
        })
    }

    pub async fn generate_performance_report(&self) -> PerformanceReport {
        let state = self.state.lock().await;
        let stats = state.stats();
        let fees_charged: f64 = state
            .history()
            .iter()
            .filter(|e| e.kind == EntryKind::FeeDeduction)
            .map(|e| e.amount)
            .sum();

        PerformanceReport {
            timestamp: Utc::now(),
            vault_balance: state.vault_balance(),
            credit_balance: state.credit_balance(),
            gross_profit: stats.gross_profit,
            fees_provisioned: stats.fees_provisioned,
            net_performance: stats.net_performance,
            recent_fees_charged: fees_charged,
            running_bots: stats.running_bots,
            panic_engaged: state.panic_engaged(),
        }
    }

    fn print_report(&self, report: &PerformanceReport) {
        log::info!("{}", "=".repeat(60));
        log::info!("Aegis performance report");
        log::info!("time: {}", report.timestamp.format("%Y-%m-%d %H:%M:%S"));
        log::info!("vault: {:.2} USDT", report.vault_balance);
        log::info!("credits: {:.2} USDT", report.credit_balance);
        log::info!(
            "gross profit: {:.2} / fees provisioned: {:.2} / net: {:.2}",
            report.gross_profit,
            report.fees_provisioned,
            report.net_performance
        );
        log::info!("fees charged (recent history): {:.4}", report.recent_fees_charged);
        log::info!("running bots: {}", report.running_bots);
        log::info!(
            "status: {}",
            if report.panic_engaged { "EMERGENCY" } else { "OPTIMAL" }
        );
        log::info!("{}", "=".repeat(60));
    }
}

#[derive(Debug)]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub vault_balance: f64,
    pub credit_balance: f64,
    pub gross_profit: f64,
    pub fees_provisioned: f64,
    pub net_performance: f64,
    pub recent_fees_charged: f64,
    pub running_bots: usize,
    pub panic_engaged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Seed;
    use crate::rng::SequenceRandom;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_report_reflects_state() {
        let engine = EngineState::new(
            Seed::defaults(&Config::default()),
            Box::new(MemoryStore::new()),
            100.0,
        )
        .with_random_sources(
            Box::new(SequenceRandom::constant(0.5)),
            Box::new(SequenceRandom::new(vec![0.8, 0.0])),
        );
        let state = Arc::new(Mutex::new(engine));
        state.lock().await.tick();

        let monitor = PerformanceMonitor::new(Arc::clone(&state));
        let report = monitor.generate_performance_report().await;
        assert!((report.credit_balance - 249.95).abs() < 1e-9);
        assert!((report.recent_fees_charged - 0.05).abs() < 1e-9);
        assert_eq!(report.running_bots, 2);
        assert!(!report.panic_engaged);
        assert!((report.vault_balance - 42_581.45).abs() < 1e-6);
    }
}
