//! Timelock scheduling.
//!
//! Offsets are relative to the moment a leg is locked and are turned into an
//! absolute [`TimeLockWindow`] using that leg's own chain time. Windows of
//! different chains are never compared; the only cross-leg reasoning is done on
//! durations, through [`SwapTimelocks::validate`] and
//! [`SwapTimelocks::max_dst_lock_delay`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Relative deadlines for one leg, in seconds after the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOffsets {
    pub withdrawal: u64,
    pub public_withdrawal: u64,
    pub cancellation: u64,
    #[serde(default)]
    pub public_cancellation: Option<u64>,
}

impl LegOffsets {
    /// Enforce `withdrawal < public_withdrawal < cancellation [< public_cancellation]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.withdrawal < self.public_withdrawal && self.public_withdrawal < self.cancellation)
        {
            return Err(CoreError::InvalidTimelocks(format!(
                "expected withdrawal < public_withdrawal < cancellation, got {} / {} / {}",
                self.withdrawal, self.public_withdrawal, self.cancellation
            )));
        }
        if let Some(public_cancellation) = self.public_cancellation {
            if public_cancellation <= self.cancellation {
                return Err(CoreError::InvalidTimelocks(format!(
                    "public_cancellation {} must be after cancellation {}",
                    public_cancellation, self.cancellation
                )));
            }
        }
        Ok(())
    }

    /// Offset by which the leg is guaranteed resolvable by its depositor alone.
    pub fn resolution_deadline(&self) -> u64 {
        self.public_cancellation.unwrap_or(self.cancellation)
    }
}

/// Offsets for both legs of a swap plus the safety margin between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTimelocks {
    pub src: LegOffsets,
    pub dst: LegOffsets,
    /// Seconds reserved for the resolver to observe a dst claim and land its src claim.
    pub resolution_margin: u64,
}

impl SwapTimelocks {
    /// Check both legs and the cross-leg safety condition.
    ///
    /// The destination leg must be fully resolved, plus the margin, before the
    /// source cancellation opens; otherwise the resolver could lose the right to
    /// claim src after the maker claimed dst.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.src.validate()?;
        self.dst.validate()?;
        let needed = self
            .dst
            .resolution_deadline()
            .saturating_add(self.resolution_margin);
        if needed > self.src.cancellation {
            return Err(CoreError::InvalidTimelocks(format!(
                "dst resolves at +{}s (+{}s margin) but src cancellation opens at +{}s",
                self.dst.resolution_deadline(),
                self.resolution_margin,
                self.src.cancellation
            )));
        }
        Ok(())
    }

    /// Longest delay, in source-chain seconds after the source lock, at which
    /// the destination may still be locked.
    pub fn max_dst_lock_delay(&self) -> u64 {
        self.src
            .cancellation
            .saturating_sub(self.dst.resolution_deadline())
            .saturating_sub(self.resolution_margin)
    }
}

/// Named offset configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelockPreset {
    /// Minutes; local networks and tests.
    Fast,
    /// About an hour; fast-finality chains.
    Standard,
    /// Several hours; chains with slow or probabilistic finality.
    Conservative,
}

impl TimelockPreset {
    pub const ALL: [TimelockPreset; 3] = [Self::Fast, Self::Standard, Self::Conservative];

    pub fn timelocks(&self) -> SwapTimelocks {
        match self {
            Self::Fast => SwapTimelocks {
                src: LegOffsets {
                    withdrawal: 10,
                    public_withdrawal: 120,
                    cancellation: 300,
                    public_cancellation: Some(360),
                },
                dst: LegOffsets {
                    withdrawal: 10,
                    public_withdrawal: 100,
                    cancellation: 200,
                    public_cancellation: None,
                },
                resolution_margin: 60,
            },
            Self::Standard => SwapTimelocks {
                src: LegOffsets {
                    withdrawal: 60,
                    public_withdrawal: 1_800,
                    cancellation: 3_600,
                    public_cancellation: Some(4_200),
                },
                dst: LegOffsets {
                    withdrawal: 60,
                    public_withdrawal: 1_200,
                    cancellation: 2_400,
                    public_cancellation: None,
                },
                resolution_margin: 600,
            },
            Self::Conservative => SwapTimelocks {
                src: LegOffsets {
                    withdrawal: 300,
                    public_withdrawal: 7_200,
                    cancellation: 14_400,
                    public_cancellation: Some(16_200),
                },
                dst: LegOffsets {
                    withdrawal: 300,
                    public_withdrawal: 3_600,
                    cancellation: 7_200,
                    public_cancellation: Some(9_000),
                },
                resolution_margin: 1_800,
            },
        }
    }
}

impl fmt::Display for TimelockPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Standard => write!(f, "standard"),
            Self::Conservative => write!(f, "conservative"),
        }
    }
}

/// Absolute deadlines of one leg, in that leg's chain time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLockWindow {
    pub locked_at: Timestamp,
    pub withdrawal: Timestamp,
    pub public_withdrawal: Timestamp,
    pub cancellation: Timestamp,
    pub public_cancellation: Option<Timestamp>,
}

/// Where a leg's chain time falls relative to its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    BeforeWithdrawal,
    Withdrawable,
    PubliclyWithdrawable,
    Cancellable,
    PubliclyCancellable,
}

impl Phase {
    pub fn can_claim(&self) -> bool {
        matches!(self, Self::Withdrawable | Self::PubliclyWithdrawable)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Cancellable | Self::PubliclyCancellable)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeWithdrawal => write!(f, "BeforeWithdrawal"),
            Self::Withdrawable => write!(f, "Withdrawable"),
            Self::PubliclyWithdrawable => write!(f, "PubliclyWithdrawable"),
            Self::Cancellable => write!(f, "Cancellable"),
            Self::PubliclyCancellable => write!(f, "PubliclyCancellable"),
        }
    }
}

/// Turns offsets into windows and answers phase queries.
pub struct TimelockScheduler;

impl TimelockScheduler {
    /// Build a window from the leg's chain time `now`.
    pub fn schedule(now: Timestamp, offsets: &LegOffsets) -> Result<TimeLockWindow, CoreError> {
        offsets.validate()?;
        Ok(TimeLockWindow {
            locked_at: now,
            withdrawal: now.plus(offsets.withdrawal),
            public_withdrawal: now.plus(offsets.public_withdrawal),
            cancellation: now.plus(offsets.cancellation),
            public_cancellation: offsets.public_cancellation.map(|o| now.plus(o)),
        })
    }

    /// Phase of `window` at chain time `now` (same chain).
    pub fn phase(window: &TimeLockWindow, now: Timestamp) -> Phase {
        if now < window.withdrawal {
            Phase::BeforeWithdrawal
        } else if now < window.public_withdrawal {
            Phase::Withdrawable
        } else if now < window.cancellation {
            Phase::PubliclyWithdrawable
        } else {
            match window.public_cancellation {
                Some(public) if now >= public => Phase::PubliclyCancellable,
                _ => Phase::Cancellable,
            }
        }
    }
}
