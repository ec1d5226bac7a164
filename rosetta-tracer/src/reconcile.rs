use rosetta_types::AccountId;
use rosetta_types::OpKind;
use rosetta_types::Operation;
use rosetta_types::TransferRecord;

use crate::mapper::MappedEvent;
use crate::mapper::Settlement;
use crate::TracerError;

fn settles(
    settlement: &Settlement,
    transfer: &TransferRecord,
) -> bool {
    transfer.from == settlement.from
        && transfer.to == settlement.to
        && transfer.value == settlement.value
}

fn plain_transfer(
    transfer: &TransferRecord,
    out: &mut Vec<Operation>,
) -> Result<(), TracerError> {
    if transfer.value.is_zero() {
        return Ok(());
    }
    out.extend(Operation::transfer(
        OpKind::Transfer,
        AccountId::main(transfer.from),
        AccountId::main(transfer.to),
        transfer.value,
    )?);
    Ok(())
}

/// Merges mapped events with the transaction's transfer trace.
///
/// Each settling event consumes the first unused matching transfer, transfers
/// skipped on the way are emitted before the event. Reverted transfers never
/// produce operations.
pub fn reconcile(
    events: Vec<MappedEvent>,
    transfers: &[TransferRecord],
) -> Result<Vec<Operation>, TracerError> {
    let succeeded: Vec<&TransferRecord> = transfers
        .iter()
        .filter(|transfer| transfer.succeeded)
        .collect();

    let mut operations = Vec::new();
    let mut cursor = 0;

    for event in events {
        if let Some(settlement) = &event.settles {
            let position = succeeded[cursor..]
                .iter()
                .position(|transfer| settles(settlement, transfer))
                .map(|offset| cursor + offset)
                .ok_or(TracerError::UnmatchedTransfer {
                    kind: settlement.kind,
                    from: settlement.from,
                    to: settlement.to,
                    value: settlement.value,
                })?;

            for transfer in &succeeded[cursor..position] {
                plain_transfer(transfer, &mut operations)?;
            }
            cursor = position + 1;
        }
        operations.extend(event.operations);
    }

    for transfer in &succeeded[cursor..] {
        plain_transfer(transfer, &mut operations)?;
    }

    Ok(operations)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use alloy_primitives::I256;
    use alloy_primitives::U256;
    use rosetta_types::SubAccount;

    use super::*;

    const USER: Address = Address::repeat_byte(0x01);
    const OTHER: Address = Address::repeat_byte(0x02);
    const LOCKED_GOLD: Address = Address::repeat_byte(0xa2);

    fn transfer(
        from: Address,
        to: Address,
        value: u64,
        succeeded: bool,
    ) -> TransferRecord {
        TransferRecord {
            from,
            to,
            value: U256::from(value),
            succeeded,
        }
    }

    fn lock_event(value: u64) -> MappedEvent {
        MappedEvent {
            operations: Operation::transfer(
                OpKind::Lock,
                AccountId::main(USER),
                AccountId::sub(USER, SubAccount::LockedGoldNonVoting),
                U256::from(value),
            )
            .unwrap()
            .to_vec(),
            settles: Some(Settlement {
                kind: OpKind::Lock,
                from: USER,
                to: LOCKED_GOLD,
                value: U256::from(value),
            }),
        }
    }

    fn kinds(ops: &[Operation]) -> Vec<OpKind> {
        ops.iter()
            .map(|op| op.kind)
            .collect()
    }

    #[test]
    fn test_plain_transfers_become_main_pairs() {
        let ops = reconcile(vec![], &[transfer(USER, OTHER, 5, true)]).unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].account, AccountId::main(USER));
        assert_eq!(ops[0].amount, I256::try_from(-5i64).unwrap());
        assert_eq!(ops[1].account, AccountId::main(OTHER));
        assert_eq!(ops[1].kind, OpKind::Transfer);
    }

    #[test]
    fn test_failed_transfers_are_dropped() {
        let ops = reconcile(
            vec![],
            &[
                transfer(USER, OTHER, 5, false),
                transfer(USER, OTHER, 0, true),
            ],
        )
        .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_settled_transfer_is_replaced_in_order() {
        let transfers = [
            transfer(OTHER, USER, 1, true),
            transfer(USER, LOCKED_GOLD, 10, true),
            transfer(USER, OTHER, 2, true),
        ];

        let ops = reconcile(vec![lock_event(10)], &transfers).unwrap();

        assert_eq!(
            kinds(&ops),
            vec![
                OpKind::Transfer,
                OpKind::Transfer,
                OpKind::Lock,
                OpKind::Lock,
                OpKind::Transfer,
                OpKind::Transfer,
            ]
        );
        assert_eq!(ops[0].account, AccountId::main(OTHER));
        assert_eq!(ops[4].account, AccountId::main(USER));
        assert_eq!(
            ops.iter()
                .fold(I256::ZERO, |acc, op| acc + op.amount),
            I256::ZERO
        );
    }

    #[test]
    fn test_reverted_match_is_not_consumed() {
        let transfers = [
            transfer(USER, LOCKED_GOLD, 10, false),
            transfer(USER, LOCKED_GOLD, 10, true),
        ];

        let ops = reconcile(vec![lock_event(10)], &transfers).unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::Lock, OpKind::Lock]);
    }

    #[test]
    fn test_repeated_events_consume_distinct_transfers() {
        let transfers = [
            transfer(USER, LOCKED_GOLD, 10, true),
            transfer(USER, LOCKED_GOLD, 10, true),
        ];

        let ops = reconcile(vec![lock_event(10), lock_event(10)], &transfers).unwrap();
        assert_eq!(ops.len(), 4);
        assert!(ops
            .iter()
            .all(|op| op.kind == OpKind::Lock));

        assert!(matches!(
            reconcile(vec![lock_event(10), lock_event(10)], &transfers[..1]),
            Err(TracerError::UnmatchedTransfer {
                kind: OpKind::Lock,
                ..
            })
        ));
    }

    #[test]
    fn test_unmatched_settlement_fails() {
        assert!(matches!(
            reconcile(vec![lock_event(10)], &[transfer(USER, LOCKED_GOLD, 9, true)]),
            Err(TracerError::UnmatchedTransfer { .. })
        ));
    }
}
