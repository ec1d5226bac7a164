use alloy_primitives::Address;
use alloy_primitives::B256;
use alloy_primitives::U256;
use rosetta_store::StoreError;
use rosetta_types::AmountOverflow;
use rosetta_types::BlockNr;
use rosetta_types::ContractId;
use rosetta_types::OpKind;
use thiserror::Error;

use crate::client::ClientError;
use crate::contracts::DecodeError;

#[derive(Debug, Error)]
pub enum TracerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store read did not complete: {reason}")]
    StoreTask { reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("transfer trace of {tx} failed: {reason}")]
    Trace { tx: B256, reason: String },

    #[error("node request failed: {0}")]
    Node(#[from] ClientError),

    #[error("{contract} is not registered")]
    MissingContract { contract: ContractId },

    #[error("no {from} -> {to} transfer of {value} backs the {kind} event")]
    UnmatchedTransfer {
        kind: OpKind,
        from: Address,
        to: Address,
        value: U256,
    },

    #[error("fee cap of {tx} is below the base fee {base_fee}")]
    FeeCapTooLow { tx: B256, base_fee: U256 },

    #[error("block {block} has no base fee")]
    MissingBaseFee { block: BlockNr },

    #[error(transparent)]
    Amount(#[from] AmountOverflow),
}
