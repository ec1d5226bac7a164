use alloy_primitives::Address;
use alloy_primitives::U256;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::BlockNr;
use crate::TxIndex;

/// A registry address update observed in a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryChange {
    /// Index of the emitting transaction, `TxIndex::MAX` for block-level logs.
    pub tx_index: TxIndex,
    pub contract: String,
    pub address: Address,
}

/// Everything one block contributes to the versioned store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChangeSet {
    pub block_number: BlockNr,
    pub fee_parameter: Option<U256>,
    pub registry_changes: Vec<RegistryChange>,
}

impl BlockChangeSet {
    pub fn new(block_number: BlockNr) -> Self {
        Self {
            block_number,
            ..Default::default()
        }
    }

    pub fn bindings(&self) -> impl Iterator<Item = RegistryBinding> + '_ {
        self.registry_changes
            .iter()
            .map(|change| RegistryBinding {
                contract: change.contract.clone(),
                from_block: self.block_number,
                from_tx: change.tx_index,
                address: change.address,
            })
    }
}

/// A registry address, effective for every position after `(from_block, from_tx)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryBinding {
    pub contract: String,
    pub from_block: BlockNr,
    pub from_tx: TxIndex,
    pub address: Address,
}
