//! Process-wide kill switch
//!
//! One-way safety latch: once set it blocks all new position opens for the
//! rest of the run. Closes remain permitted. Reset is operator-driven and
//! external; there is no in-process reset path.

use serde::Serialize;
use std::sync::Mutex;

/// Snapshot of the kill switch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KillSwitchState {
    pub active: bool,
    pub reason: String,
}

/// Shared latch, used behind an `Arc`
///
/// Single logical writer (the risk path); readers take a snapshot per tick.
#[derive(Debug, Default)]
pub struct KillSwitch {
    state: Mutex<KillSwitchState>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the switch; the first activation's reason is kept
    pub fn activate(&self, reason: &str) {
        let mut state = self.lock();
        if state.active {
            return;
        }
        state.active = true;
        state.reason = reason.to_string();
        tracing::error!(reason = %reason, "Kill switch activated");
    }

    pub fn check(&self) -> KillSwitchState {
        self.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.check().active
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, KillSwitchState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_inactive() {
        let kill = KillSwitch::new();
        assert!(!kill.is_active());
        assert_eq!(kill.check().reason, "");
    }

    #[test]
    fn test_activate_latches() {
        let kill = KillSwitch::new();
        kill.activate("cumulative_loss_breach");
        assert!(kill.is_active());
        assert_eq!(kill.check().reason, "cumulative_loss_breach");
    }

    #[test]
    fn test_first_reason_wins() {
        let kill = KillSwitch::new();
        kill.activate("first");
        kill.activate("second");
        assert_eq!(kill.check().reason, "first");
    }

    #[test]
    fn test_shared_across_threads() {
        let kill = std::sync::Arc::new(KillSwitch::new());
        let clone = kill.clone();
        std::thread::spawn(move || clone.activate("feed_staleness"))
            .join()
            .unwrap();
        assert!(kill.is_active());
    }
}
