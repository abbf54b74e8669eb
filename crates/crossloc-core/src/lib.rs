pub mod config;
pub mod error;
pub mod escrow_state;
pub mod order;
pub mod swap_state;
pub mod timelock;
pub mod types;

pub use config::SwapConfig;
pub use error::CoreError;
pub use escrow_state::EscrowState;
pub use order::{OrderBuilder, OrderId, SwapOrder};
pub use swap_state::{SwapEvent, SwapState, SwapStateMachine};
pub use timelock::{
    LegOffsets, Phase, SwapTimelocks, TimeLockWindow, TimelockPreset, TimelockScheduler,
};
pub use types::{
    eip55_checksum, Address, Amount, CancelReason, ChainFamily, ChainId, ChainSpec,
    HashAlgorithm, HashLock, HashSpec, Leg, PartyAddresses, Timestamp,
};
