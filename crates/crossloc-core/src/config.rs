use serde::{Deserialize, Serialize};

use crate::timelock::TimelockPreset;

/// Tuning for the swap orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// How often a waiting swap re-reads chain time and escrow state (milliseconds).
    pub poll_interval_ms: u64,
    /// Bound on a single confirmation wait (milliseconds).
    pub confirmation_timeout_ms: u64,
    /// Submissions of the same transaction before giving up on confirmation.
    pub max_submit_attempts: u32,
    /// Offsets used for new orders.
    pub timelock_preset: TimelockPreset,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            confirmation_timeout_ms: 30_000,
            max_submit_attempts: 3,
            timelock_preset: TimelockPreset::Standard,
        }
    }
}

impl SwapConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn confirmation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.confirmation_timeout_ms.max(1))
    }
}
