//! CrossLoc swap orchestration
//!
//! [`SwapOrchestrator`] turns a [`SwapParams`] into a signed order and drives
//! it across both chains: source lock, destination lock, secret reveal on the
//! destination, source claim, or the refund path when any of that stalls.
//! Every swap is persisted as a [`SwapRecord`] through a [`SwapStore`].

mod driver;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::SwapError;
pub use orchestrator::{LegBinding, SwapOrchestrator, SwapParams};
pub use record::{SecretCustody, SwapId, SwapRecord};
pub use store::{FileSwapStore, MemorySwapStore, SwapStore};
