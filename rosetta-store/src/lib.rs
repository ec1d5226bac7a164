//! Point-in-time store of registry addresses and the gas price minimum.
//!
//! Every value is versioned by the chain position it became effective at, so
//! readers can ask what the chain looked like to a given transaction. Writes
//! arrive one block at a time through [`VersionedWriter::apply_changes`].

pub mod error;
pub mod sqlite;

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_primitives::U256;
use rosetta_types::BlockChangeSet;
use rosetta_types::BlockNr;
use rosetta_types::TxIndex;

pub use crate::error::StoreError;
pub use crate::error::StoreResult;
pub use crate::sqlite::SqliteStore;

/// Read side of the store.
///
/// Methods are synchronous, async callers go through `spawn_blocking`.
pub trait VersionedReader: Send + Sync {
    fn last_persisted_block(&self) -> StoreResult<BlockNr>;

    /// Latest gas price minimum effective at `block`, zero if none was ever set.
    fn fee_parameter_as_of(
        &self,
        block: BlockNr,
    ) -> StoreResult<U256>;

    /// Address of `contract` as seen by the transaction at `(block, tx_index)`.
    ///
    /// Bindings made by that same transaction are not visible.
    fn registry_address_as_of(
        &self,
        block: BlockNr,
        tx_index: TxIndex,
        contract: &str,
    ) -> StoreResult<Address>;

    /// Address of `contract` once every persisted block is applied,
    /// block-level bindings of the last one included.
    fn registry_address_after_watermark(
        &self,
        contract: &str,
    ) -> StoreResult<Address>;

    /// Batch form of [`Self::registry_address_as_of`] over one snapshot.
    ///
    /// Contracts without a binding are left out of the result.
    fn registry_addresses_as_of(
        &self,
        block: BlockNr,
        tx_index: TxIndex,
        contracts: &[&str],
    ) -> StoreResult<HashMap<String, Address>>;
}

/// Write side of the store.
pub trait VersionedWriter: Send + Sync {
    /// Persist one block's changes and advance the watermark, all or nothing.
    fn apply_changes(
        &self,
        changes: &BlockChangeSet,
    ) -> StoreResult<()>;
}
