//! Compiles the balance-changing operations of a transaction.
//!
//! The [`Tracer`] combines gas fee accounting, decoded core contract events
//! and the node's low-level transfer trace into one net-zero operation list.

pub mod client;
pub mod contracts;
pub mod error;
pub mod gas;
pub mod mapper;
pub mod reconcile;
pub mod tracer;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod ledger_props;

pub use crate::client::ChainClient;
pub use crate::client::ClientError;
pub use crate::error::TracerError;
pub use crate::gas::FeeRegime;
pub use crate::gas::ForkSchedule;
pub use crate::tracer::TraceSettings;
pub use crate::tracer::Tracer;
