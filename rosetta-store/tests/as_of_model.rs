//! Model-based checks of the as-of queries against a plain in-memory history.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use alloy_primitives::U256;
use proptest::prelude::*;
use rosetta_store::SqliteStore;
use rosetta_store::StoreError;
use rosetta_store::VersionedReader;
use rosetta_store::VersionedWriter;
use rosetta_types::BlockChangeSet;
use rosetta_types::RegistryChange;

const CONTRACTS: [&str; 3] = ["Governance", "Election", "LockedGold"];

#[derive(Debug, Clone)]
struct BlockSpec {
    gap: u64,
    fee: Option<u64>,
    changes: Vec<(u32, usize, u8)>,
}

fn arb_block() -> impl Strategy<Value = BlockSpec> {
    (
        1u64..4,
        proptest::option::of(0u64..1_000),
        proptest::collection::vec((0u32..6, 0usize..CONTRACTS.len(), any::<u8>()), 0..4),
    )
        .prop_map(|(gap, fee, changes)| BlockSpec { gap, fee, changes })
}

/// Reference history keyed by `(block, tx)` per contract.
#[derive(Default)]
struct Model {
    bindings: BTreeMap<(&'static str, u64, u32), Address>,
    fees: BTreeMap<u64, U256>,
    last: u64,
}

impl Model {
    fn address_as_of(
        &self,
        block: u64,
        tx_index: u32,
        contract: &'static str,
    ) -> Option<Address> {
        self.bindings
            .range((contract, 0, 0)..(contract, block, tx_index))
            .next_back()
            .map(|(_, address)| *address)
    }

    fn fee_as_of(
        &self,
        block: u64,
    ) -> U256 {
        self.fees
            .range(..=block)
            .next_back()
            .map(|(_, value)| *value)
            .unwrap_or_default()
    }
}

fn build(blocks: &[BlockSpec]) -> (SqliteStore, Model) {
    let store = SqliteStore::in_memory().unwrap();
    let mut model = Model::default();
    let mut block_number = 0;

    for spec in blocks {
        block_number += spec.gap;

        let mut changes = BlockChangeSet::new(block_number);
        changes.fee_parameter = spec.fee.map(U256::from);
        for (tx_index, contract, byte) in &spec.changes {
            let contract = CONTRACTS[*contract];
            let key = (contract, block_number, *tx_index);
            // one binding per coordinate
            if model.bindings.contains_key(&key) {
                continue;
            }
            let address = Address::with_last_byte(*byte);
            model.bindings.insert(key, address);
            changes.registry_changes.push(RegistryChange {
                tx_index: *tx_index,
                contract: contract.to_string(),
                address,
            });
        }
        if let Some(fee) = changes.fee_parameter {
            model.fees.insert(block_number, fee);
        }
        model.last = block_number;

        store.apply_changes(&changes).unwrap();
    }

    (store, model)
}

proptest! {
    #[test]
    fn prop_registry_lookups_match_model(
        blocks in proptest::collection::vec(arb_block(), 1..12),
        positions in proptest::collection::vec((0u64..40, 0u32..8), 1..30),
    ) {
        let (store, model) = build(&blocks);

        for (block, tx_index) in positions {
            for contract in CONTRACTS {
                let result = store.registry_address_as_of(block, tx_index, contract);
                if block > model.last {
                    let is_future = matches!(result, Err(StoreError::FutureQuery { .. }));
                    prop_assert!(is_future);
                    continue;
                }
                match (model.address_as_of(block, tx_index, contract), result) {
                    (Some(expected), Ok(found)) => prop_assert_eq!(expected, found),
                    (None, Err(err)) => prop_assert!(err.is_not_found()),
                    (expected, found) => {
                        prop_assert!(false, "model {:?} store {:?}", expected, found);
                    },
                }
            }
        }
    }

    #[test]
    fn prop_lookup_never_sees_later_blocks(
        blocks in proptest::collection::vec(arb_block(), 2..12),
    ) {
        let (store, model) = build(&blocks);

        for block in 0..=model.last {
            for contract in CONTRACTS {
                if let Ok(found) = store.registry_address_as_of(block, 0, contract) {
                    let origin = model
                        .bindings
                        .iter()
                        .filter(|((name, _, _), address)| *name == contract && **address == found)
                        .map(|((_, from_block, _), _)| *from_block)
                        .min();
                    prop_assert!(origin.is_some_and(|from_block| from_block < block));
                }
            }
        }
    }

    #[test]
    fn prop_fee_lookups_match_model(
        blocks in proptest::collection::vec(arb_block(), 1..12),
    ) {
        let (store, model) = build(&blocks);

        for block in 0..=model.last {
            prop_assert_eq!(store.fee_parameter_as_of(block).unwrap(), model.fee_as_of(block));
        }
        prop_assert_eq!(store.last_persisted_block().unwrap(), model.last);
    }
}
