//! Fee accounting of a transaction paid in the base currency.
//!
//! Before the fee market fork the base fee rate is the stored gas price
//! minimum and the base fee goes to Governance. Afterwards the rate is the
//! header's base fee and the base fee goes to the FeeHandler. The tip always
//! goes to the block's coinbase.

use alloy_primitives::Address;
use alloy_primitives::U256;
use rosetta_store::StoreResult;
use rosetta_store::VersionedReader;
use rosetta_types::AmountOverflow;
use rosetta_types::BalanceSet;
use rosetta_types::BlockHeader;
use rosetta_types::BlockNr;
use rosetta_types::ContractId;
use rosetta_types::OpKind;
use rosetta_types::Operation;
use rosetta_types::Receipt;
use rosetta_types::SubAccount;
use rosetta_types::Transaction;
use rosetta_types::TxIndex;
use serde_derive::Deserialize;
use tracing::debug;

use crate::TracerError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FeeRegime {
    PreFork,
    PostFork,
}

/// Activation of the fee market fork.
#[derive(Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ForkSchedule {
    /// First block of the post-fork fee rules. `None` keeps the pre-fork rules.
    pub post_fork_block: Option<BlockNr>,
}

impl ForkSchedule {
    pub fn regime_at(
        &self,
        block: BlockNr,
    ) -> FeeRegime {
        match self.post_fork_block {
            Some(activation) if block >= activation => FeeRegime::PostFork,
            _ => FeeRegime::PreFork,
        }
    }
}

fn optional_address(lookup: StoreResult<Address>) -> StoreResult<Option<Address>> {
    match lookup {
        Ok(address) => Ok(Some(address)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Base fee rate and its receiver, `None` when the base fee is not charged.
fn base_fee_terms<S: VersionedReader + ?Sized>(
    store: &S,
    regime: FeeRegime,
    header: &BlockHeader,
    tx_index: TxIndex,
) -> Result<(U256, Option<Address>), TracerError> {
    match regime {
        FeeRegime::PreFork => {
            let rate = store.fee_parameter_as_of(header.number)?;
            let receiver = optional_address(store.registry_address_as_of(
                header.number,
                tx_index,
                ContractId::Governance.as_str(),
            ))?;
            Ok((rate, receiver))
        },
        FeeRegime::PostFork => {
            let rate = header
                .base_fee
                .ok_or(TracerError::MissingBaseFee {
                    block: header.number,
                })?;
            // The fee handler is resolved as it stands after this transaction.
            let receiver = optional_address(store.registry_address_as_of(
                header.number,
                tx_index.saturating_add(1),
                ContractId::FeeHandler.as_str(),
            ))?;
            Ok((rate, receiver))
        },
    }
}

fn mul_gas(
    rate: U256,
    gas_used: U256,
) -> Result<U256, AmountOverflow> {
    rate.checked_mul(gas_used)
        .ok_or(AmountOverflow(U256::MAX))
}

/// The `Fee` operations of `tx`, empty when it pays fees in another currency.
pub fn compile_gas_fees<S: VersionedReader + ?Sized>(
    store: &S,
    regime: FeeRegime,
    header: &BlockHeader,
    tx: &Transaction,
    receipt: &Receipt,
    sender: Address,
) -> Result<Vec<Operation>, TracerError> {
    if !tx.pays_fees_in_base_currency() {
        return Ok(Vec::new());
    }

    let (rate, receiver) = base_fee_terms(store, regime, header, receipt.transaction_index)?;
    let gas_used = U256::from(receipt.gas_used);

    let tip_rate = tx
        .effective_gas_tip(rate)
        .ok_or(TracerError::FeeCapTooLow {
            tx: tx.hash,
            base_fee: rate,
        })?;

    let mut balances = BalanceSet::new();

    let tip = mul_gas(tip_rate, gas_used)?;
    balances.credit(header.coinbase, SubAccount::Main, tip)?;
    let mut total = tip;

    match receiver {
        Some(receiver) => {
            let base_fee = mul_gas(rate, gas_used)?;
            balances.credit(receiver, SubAccount::Main, base_fee)?;
            total = total
                .checked_add(base_fee)
                .ok_or(AmountOverflow(base_fee))?;
        },
        None => {
            debug!(
                tx = %tx.hash,
                ?regime,
                "no base fee receiver registered, base fee not charged"
            );
        },
    }

    if let Some(recipient) = tx.gateway_fee_recipient {
        balances.credit(recipient, SubAccount::Main, tx.gateway_fee)?;
        total = total
            .checked_add(tx.gateway_fee)
            .ok_or(AmountOverflow(tx.gateway_fee))?;
    }

    balances.debit(sender, SubAccount::Main, total)?;

    Ok(balances.into_operations(OpKind::Fee))
}
