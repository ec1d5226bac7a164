use std::time::Duration;

use alloy_primitives::Address;
use alloy_primitives::B256;
use async_trait::async_trait;
use rosetta_types::BlockHeader;
use rosetta_types::BlockNr;
use rosetta_types::Log;
use rosetta_types::Receipt;
use rosetta_types::Transaction;
use rosetta_types::TransferRecord;
use rosetta_types::TxIndex;
use thiserror::Error;

mod rpc;

pub use rpc::RpcChainClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{method} failed: {reason}")]
    Rpc {
        method: &'static str,
        reason: String,
    },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("invalid node response: {0}")]
    InvalidResponse(String),
}

/// The node data the indexer consumes.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn latest_header(&self) -> Result<BlockHeader, ClientError>;

    async fn header_by_number(
        &self,
        number: BlockNr,
    ) -> Result<BlockHeader, ClientError>;

    async fn header_by_hash(
        &self,
        hash: B256,
    ) -> Result<BlockHeader, ClientError>;

    async fn transaction(
        &self,
        hash: B256,
    ) -> Result<Transaction, ClientError>;

    async fn receipt(
        &self,
        hash: B256,
    ) -> Result<Receipt, ClientError>;

    /// The account that signed `tx`, mined at `tx_index` of block `block_hash`.
    async fn transaction_sender(
        &self,
        tx: &Transaction,
        block_hash: B256,
        tx_index: TxIndex,
    ) -> Result<Address, ClientError>;

    /// Every log of the block, block finalization logs included.
    async fn block_logs(
        &self,
        number: BlockNr,
    ) -> Result<Vec<Log>, ClientError>;

    /// Internal value transfers of `tx_hash`, in execution order.
    async fn trace_transfers(
        &self,
        tx_hash: B256,
        tracer: &str,
        timeout: Duration,
    ) -> Result<Vec<TransferRecord>, ClientError>;
}
