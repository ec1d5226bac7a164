//! Chain data as returned by the node's JSON-RPC interface.
//!
//! Only the fields the ledger compiler reads are modelled. Celo-specific
//! transaction fields (`feeCurrency`, `gatewayFee`, `gatewayFeeRecipient`) are
//! optional so plain Ethereum payloads deserialize too.

use alloy_primitives::Address;
use alloy_primitives::Bytes;
use alloy_primitives::B256;
use alloy_primitives::U256;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::BlockNr;
use crate::TxIndex;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    #[serde(with = "alloy_serde::quantity")]
    pub number: BlockNr,

    pub hash: B256,

    /// Receiver of the transaction tips.
    #[serde(rename = "miner")]
    pub coinbase: Address,

    /// Only present once the fee-market fork is active.
    #[serde(default, rename = "baseFeePerGas")]
    pub base_fee: Option<U256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: B256,

    /// Sender, when the node already resolved it.
    #[serde(default)]
    pub from: Option<Address>,

    #[serde(default)]
    pub to: Option<Address>,

    #[serde(default)]
    pub value: U256,

    #[serde(default)]
    pub gas_price: Option<U256>,

    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,

    #[serde(default)]
    pub max_priority_fee_per_gas: Option<U256>,

    /// `None` means fees are paid in the base currency.
    #[serde(default)]
    pub fee_currency: Option<Address>,

    #[serde(default)]
    pub gateway_fee_recipient: Option<Address>,

    #[serde(default)]
    pub gateway_fee: U256,
}

impl Transaction {
    pub fn pays_fees_in_base_currency(&self) -> bool {
        self.fee_currency.is_none()
    }

    /// Per-gas amount that goes to the block producer once `base_fee` is
    /// burned or routed elsewhere. `None` when the fee cap is below the base fee.
    pub fn effective_gas_tip(
        &self,
        base_fee: U256,
    ) -> Option<U256> {
        match (self.max_fee_per_gas, self.max_priority_fee_per_gas) {
            (Some(max_fee), Some(max_priority_fee)) => {
                max_fee
                    .checked_sub(base_fee)
                    .map(|headroom| headroom.min(max_priority_fee))
            },
            _ => {
                self.gas_price
                    .unwrap_or_default()
                    .checked_sub(base_fee)
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,

    #[serde(with = "alloy_serde::quantity")]
    pub transaction_index: TxIndex,

    pub block_hash: B256,

    #[serde(with = "alloy_serde::quantity")]
    pub block_number: BlockNr,

    #[serde(with = "alloy_serde::quantity")]
    pub status: u64,

    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,

    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    pub const STATUS_FAILED: u64 = 0;
    pub const STATUS_SUCCESSFUL: u64 = 1;

    pub fn succeeded(&self) -> bool {
        self.status == Self::STATUS_SUCCESSFUL
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,

    pub topics: Vec<B256>,

    pub data: Bytes,

    /// Missing for logs emitted during block finalization.
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub transaction_index: Option<TxIndex>,
}

impl Log {
    /// The event signature hash of a non-anonymous event.
    pub fn selector(&self) -> Option<B256> {
        self.topics
            .first()
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_from_rpc_json() {
        let json = r#"{
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "transactionIndex": "0x4",
            "blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "blockNumber": "0xa",
            "status": "0x1",
            "gasUsed": "0x5208",
            "cumulativeGasUsed": "0x5208",
            "logs": [{
                "address": "0x000000000000000000000000000000000000ce10",
                "topics": ["0x3333333333333333333333333333333333333333333333333333333333333333"],
                "data": "0x",
                "transactionIndex": "0x4",
                "logIndex": "0x0"
            }]
        }"#;

        let receipt: Receipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.transaction_index, 4);
        assert_eq!(receipt.block_number, 10);
        assert_eq!(receipt.gas_used, 21_000);
        assert!(receipt.succeeded());
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].transaction_index, Some(4));
        assert_eq!(
            receipt.logs[0].selector(),
            Some(B256::repeat_byte(0x33))
        );
    }

    #[test]
    fn test_celo_transaction_fields() {
        let json = r#"{
            "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "from": "0x00000000000000000000000000000000000000aa",
            "to": null,
            "value": "0x0",
            "gasPrice": "0x3b9aca00",
            "feeCurrency": null,
            "gatewayFeeRecipient": "0x00000000000000000000000000000000000000bb",
            "gatewayFee": "0x64"
        }"#;

        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.pays_fees_in_base_currency());
        assert_eq!(tx.gateway_fee, U256::from(100));
        assert_eq!(
            tx.gateway_fee_recipient,
            Some(Address::with_last_byte(0xbb))
        );
    }

    #[test]
    fn test_effective_gas_tip() {
        let legacy = Transaction {
            gas_price: Some(U256::from(10)),
            ..test_transaction()
        };
        assert_eq!(legacy.effective_gas_tip(U256::from(4)), Some(U256::from(6)));
        assert_eq!(legacy.effective_gas_tip(U256::from(11)), None);

        let dynamic = Transaction {
            max_fee_per_gas: Some(U256::from(10)),
            max_priority_fee_per_gas: Some(U256::from(2)),
            ..test_transaction()
        };
        assert_eq!(dynamic.effective_gas_tip(U256::from(4)), Some(U256::from(2)));
        assert_eq!(dynamic.effective_gas_tip(U256::from(9)), Some(U256::from(1)));
        assert_eq!(dynamic.effective_gas_tip(U256::from(12)), None);
    }

    fn test_transaction() -> Transaction {
        Transaction {
            hash: B256::ZERO,
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
}
