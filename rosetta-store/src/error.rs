use rosetta_types::BlockNr;
use rosetta_types::TxIndex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("contract {contract} has no binding before block {block} tx {tx_index}")]
    ContractNotFound {
        contract: String,
        block: BlockNr,
        tx_index: TxIndex,
    },

    #[error("block {requested} is past the last persisted block {last_persisted}")]
    FutureQuery {
        requested: BlockNr,
        last_persisted: BlockNr,
    },

    #[error("failed to apply changes: {reason}")]
    WriteFailure { reason: String },

    #[error("sqlite error: {0}")]
    Sqlite(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ContractNotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Sqlite(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
