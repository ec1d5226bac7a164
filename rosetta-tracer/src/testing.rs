//! Test doubles for code driving a [`crate::Tracer`] or consuming chain data.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_primitives::B256;
use alloy_primitives::U256;
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use rosetta_types::BlockHeader;
use rosetta_types::BlockNr;
use rosetta_types::Log;
use rosetta_types::Receipt;
use rosetta_types::Transaction;
use rosetta_types::TransferRecord;
use rosetta_types::TxIndex;

use crate::client::ChainClient;
use crate::client::ClientError;

/// Encodes `event` as a log emitted by `address`.
pub fn event_log<E: SolEvent>(
    address: Address,
    event: &E,
    tx_index: Option<TxIndex>,
) -> Log {
    let data = event.encode_log_data();
    Log {
        address,
        topics: data.topics().to_vec(),
        data: data.data,
        transaction_index: tx_index,
    }
}

pub fn header(number: BlockNr) -> BlockHeader {
    let mut hash = B256::ZERO;
    hash[24..].copy_from_slice(&number.to_be_bytes());
    BlockHeader {
        number,
        hash,
        coinbase: Address::repeat_byte(0xcb),
        base_fee: None,
    }
}

pub fn transaction(hash: B256) -> Transaction {
    Transaction {
        hash,
        from: None,
        to: None,
        value: U256::ZERO,
        gas_price: None,
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
        fee_currency: None,
        gateway_fee_recipient: None,
        gateway_fee: U256::ZERO,
    }
}

pub fn receipt(
    tx: &Transaction,
    block: &BlockHeader,
    tx_index: TxIndex,
    gas_used: u64,
    logs: Vec<Log>,
) -> Receipt {
    Receipt {
        transaction_hash: tx.hash,
        transaction_index: tx_index,
        block_hash: block.hash,
        block_number: block.number,
        status: Receipt::STATUS_SUCCESSFUL,
        gas_used,
        logs,
    }
}

#[derive(Default)]
struct MockChain {
    headers: Vec<BlockHeader>,
    transactions: HashMap<B256, Transaction>,
    receipts: HashMap<B256, Receipt>,
    senders: HashMap<B256, Address>,
    logs: HashMap<BlockNr, Vec<Log>>,
    traces: HashMap<B256, Vec<TransferRecord>>,
}

/// An in-memory [`ChainClient`] whose chain grows as the test pushes headers.
#[derive(Default)]
pub struct MockChainClient {
    chain: Mutex<MockChain>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `header`, along with the logs the block emitted.
    pub fn push_block(
        &self,
        header: BlockHeader,
        logs: Vec<Log>,
    ) {
        let mut chain = self.lock();
        chain
            .logs
            .insert(header.number, logs);
        chain.headers.push(header);
    }

    pub fn push_transaction(
        &self,
        tx: Transaction,
        receipt: Receipt,
        sender: Address,
        transfers: Vec<TransferRecord>,
    ) {
        let mut chain = self.lock();
        chain
            .senders
            .insert(tx.hash, sender);
        chain
            .traces
            .insert(tx.hash, transfers);
        chain
            .receipts
            .insert(tx.hash, receipt);
        chain
            .transactions
            .insert(tx.hash, tx);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockChain> {
        self.chain
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found(what: impl std::fmt::Display) -> ClientError {
    ClientError::NotFound {
        what: what.to_string(),
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn latest_header(&self) -> Result<BlockHeader, ClientError> {
        self.lock()
            .headers
            .last()
            .cloned()
            .ok_or_else(|| not_found("latest block"))
    }

    async fn header_by_number(
        &self,
        number: BlockNr,
    ) -> Result<BlockHeader, ClientError> {
        self.lock()
            .headers
            .iter()
            .find(|header| header.number == number)
            .cloned()
            .ok_or_else(|| not_found(format!("block {number}")))
    }

    async fn header_by_hash(
        &self,
        hash: B256,
    ) -> Result<BlockHeader, ClientError> {
        self.lock()
            .headers
            .iter()
            .find(|header| header.hash == hash)
            .cloned()
            .ok_or_else(|| not_found(format!("block {hash}")))
    }

    async fn transaction(
        &self,
        hash: B256,
    ) -> Result<Transaction, ClientError> {
        self.lock()
            .transactions
            .get(&hash)
            .cloned()
            .ok_or_else(|| not_found(format!("transaction {hash}")))
    }

    async fn receipt(
        &self,
        hash: B256,
    ) -> Result<Receipt, ClientError> {
        self.lock()
            .receipts
            .get(&hash)
            .cloned()
            .ok_or_else(|| not_found(format!("receipt {hash}")))
    }

    async fn transaction_sender(
        &self,
        tx: &Transaction,
        _block_hash: B256,
        _tx_index: TxIndex,
    ) -> Result<Address, ClientError> {
        if let Some(from) = tx.from {
            return Ok(from);
        }
        self.lock()
            .senders
            .get(&tx.hash)
            .copied()
            .ok_or_else(|| not_found(format!("sender of {}", tx.hash)))
    }

    async fn block_logs(
        &self,
        number: BlockNr,
    ) -> Result<Vec<Log>, ClientError> {
        Ok(self
            .lock()
            .logs
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn trace_transfers(
        &self,
        tx_hash: B256,
        _tracer: &str,
        _timeout: Duration,
    ) -> Result<Vec<TransferRecord>, ClientError> {
        self.lock()
            .traces
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| ClientError::Rpc {
                method: "debug_traceTransaction",
                reason: format!("no trace for {tx_hash}"),
            })
    }
}
