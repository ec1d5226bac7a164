//! Generated transactions must always compile to balanced operations.

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_primitives::B256;
use alloy_primitives::I256;
use alloy_primitives::U256;
use proptest::prelude::*;
use rosetta_store::SqliteStore;
use rosetta_store::VersionedWriter;
use rosetta_types::BlockChangeSet;
use rosetta_types::ContractId;
use rosetta_types::Currency;
use rosetta_types::Log;
use rosetta_types::Operation;
use rosetta_types::RegistryChange;
use rosetta_types::Transaction;
use rosetta_types::TransferRecord;

use crate::contracts::IAccounts;
use crate::contracts::IElection;
use crate::contracts::ILockedGold;
use crate::gas::compile_gas_fees;
use crate::gas::FeeRegime;
use crate::mapper::map_logs;
use crate::mapper::CoreContracts;
use crate::reconcile::reconcile;
use crate::testing;
use crate::TracerError;

const ACCOUNTS: Address = Address::repeat_byte(0xa1);
const LOCKED_GOLD: Address = Address::repeat_byte(0xa2);
const ELECTION: Address = Address::repeat_byte(0xa3);
const GOVERNANCE: Address = Address::repeat_byte(0xa4);
const FEE_HANDLER: Address = Address::repeat_byte(0xa5);
const GATEWAY: Address = Address::repeat_byte(0x9a);
const SENDER: Address = Address::repeat_byte(0x5e);
const GROUP: Address = Address::repeat_byte(0x6a);

const CONTRACTS: CoreContracts = CoreContracts {
    accounts: ACCOUNTS,
    locked_gold: LOCKED_GOLD,
    election: ELECTION,
    governance: Some(GOVERNANCE),
};

fn user(index: u8) -> Address {
    Address::with_last_byte(index + 1)
}

#[derive(Debug, Clone)]
enum Step {
    Lock { user: u8, value: u64 },
    Withdraw { user: u8, value: u64 },
    Vote { user: u8, value: u64 },
    CreateAccount { user: u8 },
    Transfer { from: u8, to: u8, value: u64, succeeded: bool },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..3, 1u64..1_000).prop_map(|(user, value)| Step::Lock { user, value }),
        (0u8..3, 1u64..1_000).prop_map(|(user, value)| Step::Withdraw { user, value }),
        (0u8..3, 0u64..1_000).prop_map(|(user, value)| Step::Vote { user, value }),
        (0u8..3).prop_map(|user| Step::CreateAccount { user }),
        (0u8..3, 0u8..3, 0u64..1_000, any::<bool>()).prop_map(|(from, to, value, succeeded)| {
            Step::Transfer {
                from,
                to,
                value,
                succeeded,
            }
        }),
    ]
}

/// Logs the steps emit, and the transfers a node would trace for them.
fn execute(steps: &[Step]) -> (Vec<Log>, Vec<TransferRecord>) {
    let mut logs = Vec::new();
    let mut transfers = Vec::new();
    let record = |from, to, value: u64, succeeded| {
        TransferRecord {
            from,
            to,
            value: U256::from(value),
            succeeded,
        }
    };

    for step in steps {
        match *step {
            Step::Lock { user: index, value } => {
                let event = ILockedGold::GoldLocked {
                    account: user(index),
                    value: U256::from(value),
                };
                logs.push(testing::event_log(LOCKED_GOLD, &event, Some(0)));
                transfers.push(record(user(index), LOCKED_GOLD, value, true));
            },
            Step::Withdraw { user: index, value } => {
                let event = ILockedGold::GoldWithdrawn {
                    account: user(index),
                    value: U256::from(value),
                };
                logs.push(testing::event_log(LOCKED_GOLD, &event, Some(0)));
                transfers.push(record(LOCKED_GOLD, user(index), value, true));
            },
            Step::Vote { user: index, value } => {
                let event = IElection::ValidatorGroupVoteCast {
                    account: user(index),
                    group: GROUP,
                    value: U256::from(value),
                };
                logs.push(testing::event_log(ELECTION, &event, Some(0)));
            },
            Step::CreateAccount { user: index } => {
                let event = IAccounts::AccountCreated {
                    account: user(index),
                };
                logs.push(testing::event_log(ACCOUNTS, &event, Some(0)));
            },
            Step::Transfer {
                from,
                to,
                value,
                succeeded,
            } => transfers.push(record(user(from), user(to), value, succeeded)),
        }
    }

    (logs, transfers)
}

fn net_by_currency(operations: &[Operation]) -> HashMap<Currency, I256> {
    let mut net = HashMap::new();
    for op in operations {
        *net.entry(op.currency)
            .or_insert(I256::ZERO) += op.amount;
    }
    net
}

fn assert_balanced(operations: &[Operation]) -> Result<(), TestCaseError> {
    for (currency, net) in net_by_currency(operations) {
        prop_assert_eq!(net, I256::ZERO, "{:?} does not net to zero", currency);
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct FeeCase {
    post_fork: bool,
    rate: u64,
    tip: u64,
    headroom: u64,
    dynamic: bool,
    gas_used: u64,
    gateway_fee: Option<u64>,
    receiver_registered: bool,
}

fn arb_fee_case() -> impl Strategy<Value = FeeCase> {
    (
        any::<bool>(),
        0u64..1_000,
        0u64..1_000,
        0u64..1_000,
        any::<bool>(),
        0u64..200_000,
        proptest::option::of(0u64..1_000),
        any::<bool>(),
    )
        .prop_map(
            |(post_fork, rate, tip, headroom, dynamic, gas_used, gateway_fee, receiver_registered)| {
                FeeCase {
                    post_fork,
                    rate,
                    tip,
                    headroom,
                    dynamic,
                    gas_used,
                    gateway_fee,
                    receiver_registered,
                }
            },
        )
}

fn fee_operations(case: &FeeCase) -> Result<Vec<Operation>, TracerError> {
    let block = 5;
    let store = SqliteStore::in_memory()?;
    let mut changes = BlockChangeSet::new(block);
    changes.fee_parameter = Some(U256::from(case.rate));
    if case.receiver_registered {
        for (contract, address) in [
            (ContractId::Governance, GOVERNANCE),
            (ContractId::FeeHandler, FEE_HANDLER),
        ] {
            changes
                .registry_changes
                .push(RegistryChange {
                    tx_index: 0,
                    contract: contract.to_string(),
                    address,
                });
        }
    }
    store.apply_changes(&changes)?;

    let mut header = testing::header(block);
    let regime = if case.post_fork {
        header.base_fee = Some(U256::from(case.rate));
        FeeRegime::PostFork
    } else {
        FeeRegime::PreFork
    };

    let mut tx = testing::transaction(B256::repeat_byte(0x42));
    if case.dynamic {
        tx.max_fee_per_gas = Some(U256::from(case.rate + case.tip + case.headroom));
        tx.max_priority_fee_per_gas = Some(U256::from(case.tip));
    } else {
        tx.gas_price = Some(U256::from(case.rate + case.tip));
    }
    if let Some(fee) = case.gateway_fee {
        tx.gateway_fee_recipient = Some(GATEWAY);
        tx.gateway_fee = U256::from(fee);
    }
    let receipt = testing::receipt(&tx, &header, 1, case.gas_used, vec![]);

    compile_gas_fees(&store, regime, &header, &tx, &receipt, SENDER)
}

fn is_settling(step: &Step) -> bool {
    matches!(step, Step::Lock { .. } | Step::Withdraw { .. })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_transactions_net_to_zero(
        fees in arb_fee_case(),
        steps in proptest::collection::vec(arb_step(), 0..12),
    ) {
        let mut operations = fee_operations(&fees).unwrap();
        assert_balanced(&operations)?;

        let (logs, transfers) = execute(&steps);
        let events = map_logs(&logs, &CONTRACTS).unwrap();
        let reconciled = reconcile(events, &transfers).unwrap();
        assert_balanced(&reconciled)?;

        operations.extend(reconciled);
        assert_balanced(&operations)?;
    }

    #[test]
    fn prop_settlement_without_its_transfer_fails(
        steps in proptest::collection::vec(arb_step(), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let settling: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| is_settling(step))
            .map(|(position, _)| position)
            .collect();
        prop_assume!(!settling.is_empty());

        // Transfers of the other steps never touch LockedGold, so
        // dropping this one leaves its event without a match.
        let dropped = settling[pick.index(settling.len())];
        let (logs, _) = execute(&steps);
        let (_, transfers) = execute(
            &steps
                .iter()
                .enumerate()
                .map(|(position, step)| {
                    if position == dropped {
                        Step::CreateAccount { user: 0 }
                    } else {
                        step.clone()
                    }
                })
                .collect::<Vec<_>>(),
        );

        let events = map_logs(&logs, &CONTRACTS).unwrap();
        let result = reconcile(events, &transfers);
        prop_assert!(
            matches!(result, Err(TracerError::UnmatchedTransfer { .. })),
            "expected an unmatched transfer, got {:?}",
            result
        );
    }
}
