use crate::error::{EngineError, Rejection, Result};
use crate::interlock::PanicInterlock;
use crate::types::{BotConfig, BotDraft, BotStatus, BotType, StrategyUpdate};

/// Which bots a forced pause applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseScope {
    /// Every bot regardless of status (panic engagement).
    All,
    /// Only bots currently RUNNING (credit exhaustion).
    RunningOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub bot_name: String,
    pub from: BotStatus,
    pub to: BotStatus,
}

impl Transition {
    pub fn started(&self) -> bool {
        self.to == BotStatus::Running
    }
}

#[derive(Debug, Clone, Default)]
pub struct BotRegistry {
    bots: Vec<BotConfig>,
}

impl BotRegistry {
    pub fn new(bots: Vec<BotConfig>) -> Self {
        let mut registry = Self {
            bots: Vec::with_capacity(bots.len()),
        };
        for mut bot in bots {
            if registry.get(&bot.id).is_some() {
                log::warn!("ignoring bot with duplicate id {}", bot.id);
                continue;
            }
            bot.selected_pairs = dedup_pairs(bot.selected_pairs);
            registry.bots.push(bot);
        }
        registry
    }

    pub fn with_default_bots() -> Self {
        Self::new(default_bots())
    }

    pub fn bots(&self) -> &[BotConfig] {
        &self.bots
    }

    pub fn get(&self, id: &str) -> Option<&BotConfig> {
        self.bots.iter().find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut BotConfig> {
        self.bots
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| EngineError::BotNotFound { id: id.to_string() })
    }

    pub fn running(&self) -> Vec<&BotConfig> {
        self.bots
            .iter()
            .filter(|b| b.status == BotStatus::Running)
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.bots
            .iter()
            .filter(|b| b.status == BotStatus::Running)
            .count()
    }

    pub fn count_by_type(&self, bot_type: BotType) -> usize {
        self.bots.iter().filter(|b| b.bot_type == bot_type).count()
    }

    /// Flip a bot between RUNNING and IDLE.
    ///
    /// Refused while the interlock is engaged or credits are exhausted.
    /// Any non-RUNNING status (IDLE, PAUSED, ERROR) starts the bot.
    pub fn toggle(
        &mut self,
        id: &str,
        interlock: &PanicInterlock,
        credit_balance: f64,
    ) -> Result<Transition> {
        if interlock.is_engaged() {
            return Err(EngineError::Rejected(Rejection::PanicEngaged));
        }
        if credit_balance <= 0.0 {
            return Err(EngineError::Rejected(Rejection::CreditsExhausted));
        }

        let bot = self.get_mut(id)?;
        let from = bot.status;
        let to = if from == BotStatus::Running {
            BotStatus::Idle
        } else {
            BotStatus::Running
        };
        bot.status = to;

        Ok(Transition {
            bot_name: bot.name.clone(),
            from,
            to,
        })
    }

    /// Replace the strategy fields; status and counters are untouched.
    pub fn apply_strategy(&mut self, id: &str, update: StrategyUpdate) -> Result<&BotConfig> {
        let bot = self.get_mut(id)?;
        bot.investment = update.investment;
        bot.stop_loss = update.stop_loss;
        bot.take_profit = update.take_profit;
        bot.trailing_stop = update.trailing_stop;
        bot.selected_pairs = dedup_pairs(update.selected_pairs);
        Ok(bot)
    }

    /// Returns the number of bots whose status changed.
    pub fn force_pause_all(&mut self, scope: PauseScope) -> usize {
        let mut changed = 0;
        for bot in &mut self.bots {
            let applies = match scope {
                PauseScope::All => true,
                PauseScope::RunningOnly => bot.status == BotStatus::Running,
            };
            if applies && bot.status != BotStatus::Paused {
                bot.status = BotStatus::Paused;
                changed += 1;
            }
        }
        changed
    }

    pub fn credit_profit(&mut self, id: &str, amount: f64) -> Result<()> {
        let bot = self.get_mut(id)?;
        bot.total_profit += amount;
        Ok(())
    }

    pub fn record_trade(&mut self, id: &str) -> Result<()> {
        let bot = self.get_mut(id)?;
        bot.trades_count += 1;
        Ok(())
    }

    pub fn create(&mut self, draft: BotDraft) -> &BotConfig {
        let id = self.next_id();
        self.bots.push(BotConfig {
            id,
            name: draft.name,
            bot_type: draft.bot_type,
            status: BotStatus::Idle,
            investment: draft.strategy.investment,
            stop_loss: draft.strategy.stop_loss,
            take_profit: draft.strategy.take_profit,
            trailing_stop: draft.strategy.trailing_stop,
            selected_pairs: dedup_pairs(draft.strategy.selected_pairs),
            total_profit: 0.0,
            trades_count: 0,
        });
        &self.bots[self.bots.len() - 1]
    }

    /// Put a bot into ERROR. Only external fault reporting calls this.
    pub fn mark_error(&mut self, id: &str) -> Result<Transition> {
        let bot = self.get_mut(id)?;
        let from = bot.status;
        bot.status = BotStatus::Error;
        Ok(Transition {
            bot_name: bot.name.clone(),
            from,
            to: BotStatus::Error,
        })
    }

    pub fn total_profit(&self) -> f64 {
        self.bots.iter().map(|b| b.total_profit).sum()
    }

    fn next_id(&self) -> String {
        let mut candidate = self
            .bots
            .iter()
            .filter_map(|b| b.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        while self.get(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        candidate.to_string()
    }
}

fn dedup_pairs(pairs: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(pairs.len());
    for symbol in pairs {
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn bot(
    id: &str,
    name: &str,
    bot_type: BotType,
    status: BotStatus,
    investment: f64,
    stop_loss: f64,
    take_profit: f64,
    trailing_stop: bool,
    pairs: &[&str],
    total_profit: f64,
    trades_count: u64,
) -> BotConfig {
    BotConfig {
        id: id.to_string(),
        name: name.to_string(),
        bot_type,
        status,
        investment,
        stop_loss,
        take_profit,
        trailing_stop,
        selected_pairs: pairs.iter().map(|s| s.to_string()).collect(),
        total_profit,
        trades_count,
    }
}

pub fn default_bots() -> Vec<BotConfig> {
    vec![
        bot(
            "1",
            "Mainstream Alpha",
            BotType::Crypto,
            BotStatus::Running,
            5000.0,
            5.0,
            15.0,
            true,
            &["BTC/USDT", "ETH/USDT", "SOL/USDT"],
            450.25,
            142,
        ),
        bot(
            "2",
            "Meme Hunter V2",
            BotType::Memecoin,
            BotStatus::Idle,
            1500.0,
            10.0,
            50.0,
            true,
            &["PEPE/USDT", "WIF/USDT"],
            1205.80,
            89,
        ),
        bot(
            "3",
            "Scalper Pro",
            BotType::Daytrade,
            BotStatus::Running,
            10000.0,
            1.0,
            2.0,
            false,
            &["BTC/USDT"],
            120.40,
            345,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_registry() -> BotRegistry {
        let mut bots = default_bots();
        for b in &mut bots {
            b.status = BotStatus::Idle;
        }
        BotRegistry::new(bots)
    }

    #[test]
    fn test_toggle_alternates_from_idle() {
        let mut reg = idle_registry();
        let interlock = PanicInterlock::default();
        let mut expected = BotStatus::Running;
        for _ in 0..6 {
            let t = reg.toggle("2", &interlock, 10.0).unwrap();
            assert_eq!(t.to, expected);
            assert_eq!(reg.get("2").unwrap().status, expected);
            expected = if expected == BotStatus::Running {
                BotStatus::Idle
            } else {
                BotStatus::Running
            };
        }
    }

    #[test]
    fn test_toggle_rejected_under_panic() {
        let mut reg = idle_registry();
        let interlock = PanicInterlock::new(true);
        let err = reg.toggle("2", &interlock, 10.0).unwrap_err();
        assert!(matches!(err, EngineError::Rejected(Rejection::PanicEngaged)));
        assert_eq!(reg.get("2").unwrap().status, BotStatus::Idle);
    }

    #[test]
    fn test_toggle_rejected_without_credits() {
        let mut reg = idle_registry();
        let err = reg.toggle("2", &PanicInterlock::default(), 0.0).unwrap_err();
        assert!(matches!(err, EngineError::Rejected(Rejection::CreditsExhausted)));
    }

    #[test]
    fn test_toggle_unknown_bot() {
        let mut reg = idle_registry();
        let err = reg.toggle("99", &PanicInterlock::default(), 10.0).unwrap_err();
        assert!(matches!(err, EngineError::BotNotFound { .. }));
    }

    #[test]
    fn test_paused_and_error_toggle_like_idle() {
        let mut reg = idle_registry();
        reg.force_pause_all(PauseScope::All);
        let t = reg.toggle("1", &PanicInterlock::default(), 1.0).unwrap();
        assert_eq!((t.from, t.to), (BotStatus::Paused, BotStatus::Running));

        reg.mark_error("2").unwrap();
        let t = reg.toggle("2", &PanicInterlock::default(), 1.0).unwrap();
        assert_eq!((t.from, t.to), (BotStatus::Error, BotStatus::Running));
    }

    #[test]
    fn test_apply_strategy_keeps_status_and_counters() {
        let mut reg = BotRegistry::with_default_bots();
        let update = StrategyUpdate {
            investment: 7500.0,
            stop_loss: 3.0,
            take_profit: 9.0,
            trailing_stop: false,
            selected_pairs: vec!["SOL/USDT".into(), "SOL/USDT".into(), "BNB/USDT".into()],
        };
        let bot = reg.apply_strategy("1", update).unwrap();
        assert_eq!(bot.investment, 7500.0);
        assert_eq!(bot.selected_pairs, vec!["SOL/USDT", "BNB/USDT"]);
        assert_eq!(bot.status, BotStatus::Running);
        assert_eq!(bot.total_profit, 450.25);
        assert_eq!(bot.trades_count, 142);
    }

    #[test]
    fn test_apply_strategy_unknown_bot_no_mutation() {
        let mut reg = BotRegistry::with_default_bots();
        let before = reg.bots().to_vec();
        let update = StrategyUpdate {
            investment: 1.0,
            stop_loss: 1.0,
            take_profit: 1.0,
            trailing_stop: true,
            selected_pairs: vec![],
        };
        assert!(matches!(
            reg.apply_strategy("nope", update),
            Err(EngineError::BotNotFound { .. })
        ));
        assert_eq!(reg.bots(), before.as_slice());
    }

    #[test]
    fn test_force_pause_scopes() {
        let mut reg = BotRegistry::with_default_bots();
        assert_eq!(reg.force_pause_all(PauseScope::RunningOnly), 2);
        assert_eq!(reg.get("2").unwrap().status, BotStatus::Idle);

        let mut reg = BotRegistry::with_default_bots();
        reg.force_pause_all(PauseScope::All);
        assert!(reg.bots().iter().all(|b| b.status == BotStatus::Paused));
    }

    #[test]
    fn test_create_assigns_fresh_id() {
        let mut reg = BotRegistry::with_default_bots();
        let draft = BotDraft {
            name: "Grid Runner".into(),
            bot_type: BotType::Crypto,
            strategy: StrategyUpdate {
                investment: 250.0,
                stop_loss: 2.0,
                take_profit: 4.0,
                trailing_stop: false,
                selected_pairs: vec!["ETH/USDT".into()],
            },
        };
        let created = reg.create(draft).clone();
        assert_eq!(created.id, "4");
        assert_eq!(created.status, BotStatus::Idle);
        assert_eq!(created.trades_count, 0);
        assert_eq!(reg.count_by_type(BotType::Crypto), 2);
    }

    #[test]
    fn test_duplicate_ids_dropped_on_load() {
        let mut bots = default_bots();
        bots.push(bots[0].clone());
        let reg = BotRegistry::new(bots);
        assert_eq!(reg.bots().len(), 3);
    }

    #[test]
    fn test_credit_profit_and_trades() {
        let mut reg = BotRegistry::with_default_bots();
        reg.credit_profit("3", 1.5).unwrap();
        reg.record_trade("3").unwrap();
        let b = reg.get("3").unwrap();
        assert!((b.total_profit - 121.9).abs() < 1e-9);
        assert_eq!(b.trades_count, 346);
    }
}
