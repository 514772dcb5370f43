//! The engine aggregate: market, bots, ledger, interlock and audit trail,
//! plus the periodic tick that moves them forward.
//!
//! `EngineState` is plain data with synchronous methods. Serialization of
//! ticks and commands is the caller's job (see [`crate::service`]).

use std::collections::VecDeque;

use serde::Serialize;

use crate::audit::{AuditEvent, AuditLog, AuditSource, Severity};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::interlock::PanicInterlock;
use crate::ledger::Ledger;
use crate::market::{self, MarketModel};
use crate::registry::{self, BotRegistry, PauseScope};
use crate::rng::{RandomSource, SystemRandom};
use crate::store::{self, StateStore};
use crate::types::{
    BotConfig, BotDraft, BotStatus, BotType, LedgerEntry, Notification, StrategyUpdate,
    TradingPair,
};

/// Share of a profitable tick charged against credits.
pub const PERFORMANCE_FEE_RATE: f64 = 0.05;
/// Profit candidates above this value trigger a fee.
pub const FEE_THRESHOLD: f64 = 0.5;
const CANDIDATE_SPAN: f64 = 1.5;
const CANDIDATE_OFFSET: f64 = 0.2;
/// Undrained notifications kept before the oldest are dropped.
pub const NOTIFICATION_CAP: usize = 40;

/// Initial values for a fresh engine.
#[derive(Debug, Clone)]
pub struct Seed {
    pub pairs: Vec<TradingPair>,
    pub bots: Vec<BotConfig>,
    pub vault_balance: f64,
    pub credit_balance: f64,
    pub history: Vec<LedgerEntry>,
    pub panic_engaged: bool,
}

impl Seed {
    pub fn defaults(config: &Config) -> Self {
        Self {
            pairs: market::default_pairs(),
            bots: registry::default_bots(),
            vault_balance: config.initial_vault_balance,
            credit_balance: config.initial_credit_balance,
            history: Vec::new(),
            panic_engaged: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeCharge {
    pub amount: f64,
    pub bot_id: String,
    pub bot_name: String,
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Profit candidate drawn, if the tick reached the trading step.
    pub candidate: Option<f64>,
    pub fee: Option<FeeCharge>,
    /// Bots paused because credits ran out.
    pub paused_for_credits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub gross_profit: f64,
    pub fees_provisioned: f64,
    pub net_performance: f64,
    pub running_bots: usize,
    pub crypto_bots: usize,
    pub memecoin_bots: usize,
    pub daytrade_bots: usize,
}

/// Read-only view of the whole engine, taken under one lock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub pairs: Vec<TradingPair>,
    pub bots: Vec<BotConfig>,
    pub vault_balance: f64,
    pub credit_balance: f64,
    /// Newest first.
    pub history: Vec<LedgerEntry>,
    pub panic_engaged: bool,
    /// Oldest first.
    pub audit_log: Vec<AuditEvent>,
    pub stats: PortfolioStats,
}

#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    bots: bool,
    credits: bool,
    balance: bool,
    billing: bool,
    panic: bool,
}

impl Dirty {
    fn all() -> Self {
        Self {
            bots: true,
            credits: true,
            balance: true,
            billing: true,
            panic: true,
        }
    }
}

pub struct EngineState {
    market: MarketModel,
    registry: BotRegistry,
    ledger: Ledger,
    interlock: PanicInterlock,
    audit: AuditLog,
    notifications: VecDeque<Notification>,
    market_rng: Box<dyn RandomSource>,
    trade_rng: Box<dyn RandomSource>,
    store: Box<dyn StateStore>,
    dirty: Dirty,
    deposit_amount: f64,
}

impl EngineState {
    pub fn new(seed: Seed, store: Box<dyn StateStore>, deposit_amount: f64) -> Self {
        let mut engine = Self {
            market: MarketModel::new(seed.pairs),
            registry: BotRegistry::new(seed.bots),
            ledger: Ledger::new(seed.vault_balance, seed.credit_balance, seed.history),
            interlock: PanicInterlock::new(seed.panic_engaged),
            audit: AuditLog::new(),
            notifications: VecDeque::new(),
            market_rng: Box::new(SystemRandom::new()),
            trade_rng: Box::new(SystemRandom::new()),
            store,
            dirty: Dirty::default(),
            deposit_amount,
        };
        engine.audit.record(
            AuditSource::System,
            Severity::Success,
            "Aegis protocol online: security layer active.",
        );
        if engine.interlock.is_engaged() {
            let paused = engine.registry.force_pause_all(PauseScope::All);
            log::warn!(
                "starting with panic interlock engaged, {} bot(s) forced to PAUSED",
                paused
            );
            if paused > 0 {
                engine.dirty.bots = true;
            }
        }
        engine
    }

    /// Build from persisted values, falling back to seed defaults per key.
    pub fn restore(config: &Config, backend: Box<dyn StateStore>) -> Self {
        let defaults = Seed::defaults(config);
        let seed = Seed {
            pairs: defaults.pairs,
            bots: store::load_or(backend.as_ref(), store::KEY_BOTS, defaults.bots),
            vault_balance: store::load_or(
                backend.as_ref(),
                store::KEY_BALANCE,
                defaults.vault_balance,
            ),
            credit_balance: store::load_or(
                backend.as_ref(),
                store::KEY_CREDITS,
                defaults.credit_balance,
            ),
            history: store::load_or(backend.as_ref(), store::KEY_BILLING, defaults.history),
            panic_engaged: store::load_or(
                backend.as_ref(),
                store::KEY_PANIC,
                defaults.panic_engaged,
            ),
        };
        Self::new(seed, backend, config.deposit_amount)
    }

    /// Swap the random sources driving the market walk and the profit model.
    pub fn with_random_sources(
        mut self,
        market: Box<dyn RandomSource>,
        trade: Box<dyn RandomSource>,
    ) -> Self {
        self.market_rng = market;
        self.trade_rng = trade;
        self
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        self.market.tick(self.market_rng.as_mut());

        let running: Vec<(String, String)> = self
            .registry
            .running()
            .into_iter()
            .map(|b| (b.id.clone(), b.name.clone()))
            .collect();

        if !self.interlock.is_engaged() && self.ledger.has_credits() && !running.is_empty() {
            let candidate = self.trade_rng.next_unit() * CANDIDATE_SPAN - CANDIDATE_OFFSET;
            report.candidate = Some(candidate);

            if candidate > FEE_THRESHOLD {
                let fee = candidate * PERFORMANCE_FEE_RATE;
                let (bot_id, bot_name) = running[self.trade_rng.pick(running.len())].clone();
                report.fee = self.charge_fee(fee, candidate, bot_id, bot_name);
            }

            // Vault tracks gross P&L; the fee comes out of credits only.
            self.ledger.adjust_vault(candidate);
            self.dirty.balance = true;
        }

        if !self.ledger.has_credits() && self.registry.running_count() > 0 {
            report.paused_for_credits = self.registry.force_pause_all(PauseScope::RunningOnly);
            self.dirty.bots = true;
            self.audit.record(
                AuditSource::System,
                Severity::Error,
                "Aegis credits exhausted. Bots paused for safety.",
            );
            self.notify(Notification::error("CREDIT BALANCE DEPLETED. Bots suspended."));
        }

        self.persist_dirty();
        report
    }

    fn charge_fee(
        &mut self,
        fee: f64,
        candidate: f64,
        bot_id: String,
        bot_name: String,
    ) -> Option<FeeCharge> {
        if let Err(e) = self.ledger.deduct_fee(fee, &bot_name) {
            log::error!("fee deduction for {} failed: {}", bot_name, e);
            return None;
        }
        if let Err(e) = self
            .registry
            .credit_profit(&bot_id, candidate)
            .and_then(|_| self.registry.record_trade(&bot_id))
        {
            log::error!("profit attribution for {} failed: {}", bot_id, e);
        }
        self.dirty.credits = true;
        self.dirty.billing = true;
        self.dirty.bots = true;

        self.audit.record(
            AuditSource::Finance,
            Severity::Info,
            format!("5% performance fee deducted: ${:.2} ({})", fee, bot_name),
        );

        Some(FeeCharge {
            amount: fee,
            bot_id,
            bot_name,
        })
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start or stop a bot.
    ///
    /// Refusals (panic engaged, no credits) are not errors: they come back
    /// as an error-kind notification with state untouched. Unknown ids are
    /// errors.
    pub fn toggle_bot(&mut self, id: &str) -> Result<Notification> {
        let credits = self.ledger.credit_balance();
        match self.registry.toggle(id, &self.interlock, credits) {
            Ok(transition) => {
                self.dirty.bots = true;
                let note = if transition.started() {
                    self.audit.record(
                        AuditSource::System,
                        Severity::Success,
                        format!("Started: {}", transition.bot_name),
                    );
                    Notification::success(format!("{} started", transition.bot_name))
                } else {
                    self.audit.record(
                        AuditSource::System,
                        Severity::Warning,
                        format!("Paused: {}", transition.bot_name),
                    );
                    Notification::info(format!("{} paused", transition.bot_name))
                };
                self.persist_dirty();
                Ok(self.notify(note))
            }
            Err(EngineError::Rejected(rejection)) => {
                log::info!("toggle of bot {} rejected: {}", id, rejection);
                Ok(self.notify(Notification::error(rejection.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    pub fn save_strategy(&mut self, id: &str, update: StrategyUpdate) -> Result<Notification> {
        let name = self.registry.apply_strategy(id, update)?.name.clone();
        self.dirty.bots = true;
        self.audit.record(
            AuditSource::Ia,
            Severity::Success,
            format!("Strategy optimised for {}", name),
        );
        self.persist_dirty();
        Ok(self.notify(Notification::success(format!("Strategy {} updated.", name))))
    }

    /// Top up credits by the configured deposit amount.
    pub fn deposit_credits(&mut self) -> Result<Notification> {
        self.deposit(self.deposit_amount)
    }

    pub fn deposit(&mut self, amount: f64) -> Result<Notification> {
        self.ledger.deposit(amount)?;
        self.dirty.credits = true;
        self.dirty.billing = true;
        self.audit.record(
            AuditSource::Finance,
            Severity::Success,
            format!("Deposit of {:.2} USDT in Aegis credits confirmed.", amount),
        );
        self.persist_dirty();
        Ok(self.notify(Notification::success(format!(
            "Credits topped up: +${:.2}",
            amount
        ))))
    }

    pub fn engage_panic(&mut self) -> Notification {
        let note = self.interlock.engage(&mut self.registry, &mut self.audit);
        self.dirty.panic = true;
        self.dirty.bots = true;
        self.persist_dirty();
        self.notify(note)
    }

    pub fn disengage_panic(&mut self) -> Notification {
        let note = self.interlock.disengage(&mut self.audit);
        self.dirty.panic = true;
        self.persist_dirty();
        self.notify(note)
    }

    /// Register a new IDLE bot and return its id.
    pub fn create_bot(&mut self, draft: BotDraft) -> String {
        let (id, name) = {
            let bot = self.registry.create(draft);
            (bot.id.clone(), bot.name.clone())
        };
        self.dirty.bots = true;
        self.audit.record(
            AuditSource::Ia,
            Severity::Info,
            format!("Bot registered: {} (#{})", name, id),
        );
        self.persist_dirty();
        self.notify(Notification::info(format!("{} created", name)));
        id
    }

    /// Report an external fault for a bot, moving it to ERROR.
    pub fn inject_fault(&mut self, id: &str, reason: &str) -> Result<Notification> {
        let transition = self.registry.mark_error(id)?;
        self.dirty.bots = true;
        self.audit.record(
            AuditSource::System,
            Severity::Error,
            format!(
                "Fault on {} (was {}): {}",
                transition.bot_name,
                transition.from.as_str(),
                reason
            ),
        );
        self.persist_dirty();
        Ok(self.notify(Notification::error(format!(
            "{} halted: {}",
            transition.bot_name, reason
        ))))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            pairs: self.market.pairs().to_vec(),
            bots: self.registry.bots().to_vec(),
            vault_balance: self.ledger.vault_balance(),
            credit_balance: self.ledger.credit_balance(),
            history: self.ledger.history().cloned().collect(),
            panic_engaged: self.interlock.is_engaged(),
            audit_log: self.audit.events().cloned().collect(),
            stats: self.stats(),
        }
    }

    pub fn stats(&self) -> PortfolioStats {
        let gross_profit = self.registry.total_profit();
        let fees_provisioned = gross_profit * PERFORMANCE_FEE_RATE;
        PortfolioStats {
            gross_profit,
            fees_provisioned,
            net_performance: gross_profit - fees_provisioned,
            running_bots: self.registry.running_count(),
            crypto_bots: self.registry.count_by_type(BotType::Crypto),
            memecoin_bots: self.registry.count_by_type(BotType::Memecoin),
            daytrade_bots: self.registry.count_by_type(BotType::Daytrade),
        }
    }

    pub fn pairs(&self) -> &[TradingPair] {
        self.market.pairs()
    }

    pub fn bot(&self, id: &str) -> Option<&BotConfig> {
        self.registry.get(id)
    }

    pub fn bot_status(&self, id: &str) -> Option<BotStatus> {
        self.registry.get(id).map(|b| b.status)
    }

    pub fn vault_balance(&self) -> f64 {
        self.ledger.vault_balance()
    }

    pub fn credit_balance(&self) -> f64 {
        self.ledger.credit_balance()
    }

    pub fn panic_engaged(&self) -> bool {
        self.interlock.is_engaged()
    }

    pub fn history(&self) -> Vec<LedgerEntry> {
        self.ledger.history().cloned().collect()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Drain queued notifications, oldest first. At most
    /// [`NOTIFICATION_CAP`] of the most recent are kept between drains.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write every aggregate regardless of dirtiness.
    pub fn persist_all(&mut self) -> Result<()> {
        self.dirty = Dirty::all();
        self.write_dirty()
    }

    fn persist_dirty(&mut self) {
        if let Err(e) = self.write_dirty() {
            log::error!("failed to persist engine state: {}", e);
        }
    }

    fn write_dirty(&mut self) -> Result<()> {
        let backend = self.store.as_mut();
        if self.dirty.bots {
            store::save_value(backend, store::KEY_BOTS, &self.registry.bots())?;
            self.dirty.bots = false;
        }
        if self.dirty.credits {
            store::save_value(backend, store::KEY_CREDITS, &self.ledger.credit_balance())?;
            self.dirty.credits = false;
        }
        if self.dirty.balance {
            store::save_value(backend, store::KEY_BALANCE, &self.ledger.vault_balance())?;
            self.dirty.balance = false;
        }
        if self.dirty.billing {
            let history: Vec<&LedgerEntry> = self.ledger.history().collect();
            store::save_value(backend, store::KEY_BILLING, &history)?;
            self.dirty.billing = false;
        }
        if self.dirty.panic {
            store::save_value(backend, store::KEY_PANIC, &self.interlock.is_engaged())?;
            self.dirty.panic = false;
        }
        Ok(())
    }

    fn notify(&mut self, note: Notification) -> Notification {
        self.notifications.push_back(note.clone());
        while self.notifications.len() > NOTIFICATION_CAP {
            self.notifications.pop_front();
        }
        note
    }
}
