//! Global panic interlock.
//!
//! Engaging suspends every bot at once and blocks activation until an
//! operator clears it. Clearing never resumes bots on its own.

use crate::audit::{AuditLog, AuditSource, Severity};
use crate::registry::{BotRegistry, PauseScope};
use crate::types::Notification;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanicInterlock {
    engaged: bool,
}

impl PanicInterlock {
    pub fn new(engaged: bool) -> Self {
        Self { engaged }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Idempotent. Pauses every bot, including IDLE ones.
    pub fn engage(&mut self, registry: &mut BotRegistry, audit: &mut AuditLog) -> Notification {
        self.engaged = true;
        let changed = registry.force_pause_all(PauseScope::All);
        log::debug!("panic engaged, {} bot(s) changed status", changed);
        audit.record(
            AuditSource::System,
            Severity::Error,
            "!!! EMERGENCY PANIC STOP ACTIVATED !!!",
        );
        Notification::error("PANIC MODE ENGAGED: all orders suspended.")
    }

    pub fn disengage(&mut self, audit: &mut AuditLog) -> Notification {
        self.engaged = false;
        audit.record(
            AuditSource::System,
            Severity::Success,
            "Emergency protocol disengaged.",
        );
        Notification::success("Systems reactivated successfully.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BotStatus;

    #[test]
    fn test_engage_pauses_everything() {
        let mut reg = BotRegistry::with_default_bots();
        let mut audit = AuditLog::new();
        let mut interlock = PanicInterlock::default();

        let note = interlock.engage(&mut reg, &mut audit);
        assert!(interlock.is_engaged());
        assert!(note.is_error());
        assert!(reg.bots().iter().all(|b| b.status == BotStatus::Paused));
        assert_eq!(audit.last().unwrap().source, AuditSource::System);
        assert_eq!(audit.last().unwrap().severity, Severity::Error);

        // second engage is harmless
        interlock.engage(&mut reg, &mut audit);
        assert!(interlock.is_engaged());
        assert!(reg.bots().iter().all(|b| b.status == BotStatus::Paused));
    }

    #[test]
    fn test_disengage_does_not_resume() {
        let mut reg = BotRegistry::with_default_bots();
        let mut audit = AuditLog::new();
        let mut interlock = PanicInterlock::default();
        interlock.engage(&mut reg, &mut audit);

        let before = reg.bots().to_vec();
        let note = interlock.disengage(&mut audit);
        assert!(!interlock.is_engaged());
        assert_eq!(reg.bots(), before.as_slice());
        assert_eq!(audit.last().unwrap().severity, Severity::Success);
        assert!(!note.is_error());
    }
}
