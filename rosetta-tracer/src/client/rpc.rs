use std::fmt::Display;
use std::time::Duration;

use alloy::rpc::client::ClientBuilder;
use alloy::rpc::client::RpcClient;
use alloy_primitives::Address;
use alloy_primitives::B256;
use alloy_primitives::U256;
use alloy_primitives::U64;
use async_trait::async_trait;
use rosetta_types::BlockHeader;
use rosetta_types::BlockNr;
use rosetta_types::Log;
use rosetta_types::Receipt;
use rosetta_types::Transaction;
use rosetta_types::TransferRecord;
use rosetta_types::TxIndex;
use serde_derive::Deserialize;
use serde_json::json;
use tracing::trace;
use url::Url;

use super::ChainClient;
use super::ClientError;

const TRANSFER_STATUS_SUCCESS: &str = "success";

/// [`ChainClient`] over the node's HTTP JSON-RPC endpoint.
pub struct RpcChainClient {
    client: RpcClient,
}

#[derive(Debug, Deserialize)]
struct TransferTrace {
    #[serde(default)]
    transfers: Vec<TracedTransfer>,
}

#[derive(Debug, Deserialize)]
struct TracedTransfer {
    from: Address,
    to: Address,
    value: U256,
    status: String,
}

impl From<TracedTransfer> for TransferRecord {
    fn from(transfer: TracedTransfer) -> Self {
        TransferRecord {
            from: transfer.from,
            to: transfer.to,
            value: transfer.value,
            succeeded: transfer.status == TRANSFER_STATUS_SUCCESS,
        }
    }
}

fn rpc_error<E: Display>(method: &'static str) -> impl FnOnce(E) -> ClientError {
    move |err| {
        ClientError::Rpc {
            method,
            reason: err.to_string(),
        }
    }
}

fn found<T>(
    value: Option<T>,
    what: impl FnOnce() -> String,
) -> Result<T, ClientError> {
    value.ok_or_else(|| ClientError::NotFound { what: what() })
}

/// Options of `debug_traceTransaction`, the timeout as a Go duration.
fn trace_config(
    tracer: &str,
    timeout: Duration,
) -> serde_json::Value {
    json!({
        "tracer": tracer,
        "timeout": format!("{}ms", timeout.as_millis()),
    })
}

impl RpcChainClient {
    pub fn new(url: Url) -> Self {
        Self {
            client: ClientBuilder::default().http(url),
        }
    }

    pub fn connect(url: &str) -> Result<Self, ClientError> {
        let url = url
            .parse::<Url>()
            .map_err(|err| ClientError::InvalidResponse(format!("invalid node url {url}: {err}")))?;
        Ok(Self::new(url))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn latest_header(&self) -> Result<BlockHeader, ClientError> {
        let header: Option<BlockHeader> = self
            .client
            .request("eth_getBlockByNumber", ("latest", false))
            .await
            .map_err(rpc_error("eth_getBlockByNumber"))?;
        found(header, || "latest block".to_string())
    }

    async fn header_by_number(
        &self,
        number: BlockNr,
    ) -> Result<BlockHeader, ClientError> {
        let header: Option<BlockHeader> = self
            .client
            .request("eth_getBlockByNumber", (U64::from(number), false))
            .await
            .map_err(rpc_error("eth_getBlockByNumber"))?;
        found(header, || format!("block {number}"))
    }

    async fn header_by_hash(
        &self,
        hash: B256,
    ) -> Result<BlockHeader, ClientError> {
        let header: Option<BlockHeader> = self
            .client
            .request("eth_getBlockByHash", (hash, false))
            .await
            .map_err(rpc_error("eth_getBlockByHash"))?;
        found(header, || format!("block {hash}"))
    }

    async fn transaction(
        &self,
        hash: B256,
    ) -> Result<Transaction, ClientError> {
        let tx: Option<Transaction> = self
            .client
            .request("eth_getTransactionByHash", (hash,))
            .await
            .map_err(rpc_error("eth_getTransactionByHash"))?;
        found(tx, || format!("transaction {hash}"))
    }

    async fn receipt(
        &self,
        hash: B256,
    ) -> Result<Receipt, ClientError> {
        let receipt: Option<Receipt> = self
            .client
            .request("eth_getTransactionReceipt", (hash,))
            .await
            .map_err(rpc_error("eth_getTransactionReceipt"))?;
        found(receipt, || format!("receipt {hash}"))
    }

    async fn transaction_sender(
        &self,
        tx: &Transaction,
        block_hash: B256,
        tx_index: TxIndex,
    ) -> Result<Address, ClientError> {
        if let Some(from) = tx.from {
            return Ok(from);
        }

        let mined: Option<Transaction> = self
            .client
            .request(
                "eth_getTransactionByBlockHashAndIndex",
                (block_hash, U64::from(tx_index)),
            )
            .await
            .map_err(rpc_error("eth_getTransactionByBlockHashAndIndex"))?;
        let mined = found(mined, || format!("transaction {tx_index} of block {block_hash}"))?;

        if mined.hash != tx.hash {
            return Err(ClientError::InvalidResponse(format!(
                "transaction {tx_index} of block {block_hash} is {}, expected {}",
                mined.hash, tx.hash
            )));
        }
        mined.from.ok_or_else(|| {
            ClientError::InvalidResponse(format!("node did not resolve the sender of {}", tx.hash))
        })
    }

    async fn block_logs(
        &self,
        number: BlockNr,
    ) -> Result<Vec<Log>, ClientError> {
        let filter = json!({
            "fromBlock": U64::from(number),
            "toBlock": U64::from(number),
        });
        let logs: Vec<Log> = self
            .client
            .request("eth_getLogs", (filter,))
            .await
            .map_err(rpc_error("eth_getLogs"))?;
        trace!(block = number, logs = logs.len(), "fetched block logs");
        Ok(logs)
    }

    async fn trace_transfers(
        &self,
        tx_hash: B256,
        tracer: &str,
        timeout: Duration,
    ) -> Result<Vec<TransferRecord>, ClientError> {
        let config = trace_config(tracer, timeout);
        let trace: TransferTrace = self
            .client
            .request("debug_traceTransaction", (tx_hash, config))
            .await
            .map_err(rpc_error("debug_traceTransaction"))?;

        Ok(trace
            .transfers
            .into_iter()
            .map(TransferRecord::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_trace_from_json() {
        let json = r#"{
            "transfers": [
                {
                    "from": "0x00000000000000000000000000000000000000aa",
                    "to": "0x00000000000000000000000000000000000000bb",
                    "value": "0x64",
                    "status": "success"
                },
                {
                    "from": "0x00000000000000000000000000000000000000bb",
                    "to": "0x00000000000000000000000000000000000000cc",
                    "value": "0x1",
                    "status": "revert"
                }
            ]
        }"#;

        let trace: TransferTrace = serde_json::from_str(json).unwrap();
        let records: Vec<TransferRecord> = trace
            .transfers
            .into_iter()
            .map(TransferRecord::from)
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].from, Address::with_last_byte(0xaa));
        assert_eq!(records[0].value, U256::from(100));
        assert!(records[0].succeeded);
        assert!(!records[1].succeeded);
    }

    #[test]
    fn test_trace_timeout_keeps_sub_second_precision() {
        let config = trace_config("transferTracer", Duration::from_millis(250));
        assert_eq!(config["tracer"], "transferTracer");
        assert_eq!(config["timeout"], "250ms");

        let config = trace_config("transferTracer", Duration::from_secs(30));
        assert_eq!(config["timeout"], "30000ms");
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        assert!(RpcChainClient::connect("not a url").is_err());
    }
}
