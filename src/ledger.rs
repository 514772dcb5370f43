//! Vault balance, credit balance and billing history.
//!
//! History is kept newest-first: appends go to the front and eviction
//! trims the back, so at most [`HISTORY_CAP`] of the most recent entries
//! survive.

use std::collections::VecDeque;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{EngineError, Result};
use crate::types::{EntryKind, EntryStatus, LedgerEntry};

pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct Ledger {
    vault_balance: f64,
    credit_balance: f64,
    history: VecDeque<LedgerEntry>,
}

impl Ledger {
    pub fn new(vault_balance: f64, credit_balance: f64, history: Vec<LedgerEntry>) -> Self {
        let mut history: VecDeque<LedgerEntry> = history.into();
        history.truncate(HISTORY_CAP);
        Self {
            vault_balance,
            credit_balance: credit_balance.max(0.0),
            history,
        }
    }

    pub fn vault_balance(&self) -> f64 {
        self.vault_balance
    }

    pub fn credit_balance(&self) -> f64 {
        self.credit_balance
    }

    pub fn has_credits(&self) -> bool {
        self.credit_balance > 0.0
    }

    /// Newest first.
    pub fn history(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn deposit(&mut self, amount: f64) -> Result<&LedgerEntry> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(EngineError::InvalidAmount(amount));
        }
        self.credit_balance += amount;
        Ok(self.append(amount, EntryKind::Deposit, None))
    }

    /// Debit a performance fee from credits. The balance clamps at zero.
    pub fn deduct_fee(&mut self, amount: f64, bot_name: &str) -> Result<&LedgerEntry> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(EngineError::InvalidAmount(amount));
        }
        self.credit_balance = (self.credit_balance - amount).max(0.0);
        Ok(self.append(amount, EntryKind::FeeDeduction, Some(bot_name.to_string())))
    }

    pub fn adjust_vault(&mut self, delta: f64) {
        self.vault_balance += delta;
    }

    fn append(&mut self, amount: f64, kind: EntryKind, bot_name: Option<String>) -> &LedgerEntry {
        self.history.push_front(LedgerEntry {
            id: new_transaction_id(),
            timestamp: Utc::now(),
            amount,
            kind,
            bot_name,
            status: EntryStatus::Completed,
        });
        self.history.truncate(HISTORY_CAP);
        &self.history[0]
    }
}

fn new_transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("TX-{}", suffix.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_deposit_adds_exact_amount_and_one_entry() {
        let mut ledger = Ledger::new(0.0, 12.5, Vec::new());
        let entry = ledger.deposit(100.0).unwrap().clone();
        assert!(approx(ledger.credit_balance(), 112.5));
        assert_eq!(ledger.history_len(), 1);
        assert_eq!(entry.kind, EntryKind::Deposit);
        assert_eq!(entry.amount, 100.0);
        assert_eq!(entry.bot_name, None);
        assert_eq!(entry.status, EntryStatus::Completed);
        assert!(entry.id.starts_with("TX-"));
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let mut ledger = Ledger::new(0.0, 1.0, Vec::new());
        assert!(matches!(ledger.deposit(0.0), Err(EngineError::InvalidAmount(_))));
        assert!(matches!(ledger.deposit(f64::NAN), Err(EngineError::InvalidAmount(_))));
        assert_eq!(ledger.history_len(), 0);
    }

    #[test]
    fn test_fee_clamps_at_zero() {
        let mut ledger = Ledger::new(0.0, 0.03, Vec::new());
        let entry = ledger.deduct_fee(0.04, "Scalper Pro").unwrap().clone();
        assert_eq!(ledger.credit_balance(), 0.0);
        assert!(!ledger.has_credits());
        assert_eq!(entry.amount, 0.04);
        assert_eq!(entry.bot_name.as_deref(), Some("Scalper Pro"));
    }

    #[test]
    fn test_vault_moves_by_delta() {
        let mut ledger = Ledger::new(100.0, 1.0, Vec::new());
        ledger.adjust_vault(1.25);
        ledger.adjust_vault(-0.25);
        assert!(approx(ledger.vault_balance(), 101.0));
        assert!(approx(ledger.credit_balance(), 1.0));
    }

    #[test]
    fn test_history_keeps_fifty_most_recent() {
        let mut ledger = Ledger::new(0.0, 0.0, Vec::new());
        for i in 1..=50 {
            ledger.deposit(i as f64).unwrap();
        }
        assert_eq!(ledger.history_len(), 50);

        ledger.deposit(51.0).unwrap();
        assert_eq!(ledger.history_len(), 50);
        let amounts: Vec<f64> = ledger.history().map(|e| e.amount).collect();
        assert_eq!(amounts[0], 51.0);
        assert!(!amounts.contains(&1.0));
        assert!(amounts.contains(&2.0));
    }

    #[test]
    fn test_restored_history_is_truncated() {
        let mut seed = Ledger::new(0.0, 0.0, Vec::new());
        for i in 0..50 {
            seed.deposit(1.0 + i as f64).unwrap();
        }
        let mut entries: Vec<LedgerEntry> = seed.history().cloned().collect();
        entries.extend(entries.clone());
        let restored = Ledger::new(0.0, -5.0, entries);
        assert_eq!(restored.history_len(), HISTORY_CAP);
        assert_eq!(restored.credit_balance(), 0.0);
    }
}
