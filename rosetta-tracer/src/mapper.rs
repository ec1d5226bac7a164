//! Maps decoded core contract events to ledger operations.

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_primitives::U256;
use rosetta_types::AccountId;
use rosetta_types::ContractId;
use rosetta_types::Log;
use rosetta_types::OpKind;
use rosetta_types::OpMetadata;
use rosetta_types::Operation;
use rosetta_types::SubAccount;
use tracing::warn;

use crate::contracts::is_proxy_log;
use crate::contracts::AccountsEvent;
use crate::contracts::ContractEvent;
use crate::contracts::DecodeError;
use crate::contracts::ElectionEvent;
use crate::contracts::LockedGoldEvent;
use crate::TracerError;

/// Registry contracts the mapper decodes logs of.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CoreContracts {
    pub accounts: Address,
    pub locked_gold: Address,
    pub election: Address,
    pub governance: Option<Address>,
}

impl CoreContracts {
    /// The contracts looked up for every traced transaction.
    pub const LOOKUP: [ContractId; 4] = [
        ContractId::Accounts,
        ContractId::LockedGold,
        ContractId::Election,
        ContractId::Governance,
    ];

    /// `None` when one of the required contracts is not deployed yet.
    pub fn from_registry(addresses: &HashMap<String, Address>) -> Option<Self> {
        let get = |contract: ContractId| {
            addresses
                .get(contract.as_str())
                .copied()
        };

        Some(Self {
            accounts: get(ContractId::Accounts)?,
            locked_gold: get(ContractId::LockedGold)?,
            election: get(ContractId::Election)?,
            governance: get(ContractId::Governance),
        })
    }
}

/// A raw value movement an event accounts for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub kind: OpKind,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// The operations of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedEvent {
    pub operations: Vec<Operation>,
    /// Set when the event replaces a transfer of the node's trace.
    pub settles: Option<Settlement>,
}

impl MappedEvent {
    fn plain(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            settles: None,
        }
    }
}

fn move_between(
    kind: OpKind,
    account: Address,
    from: SubAccount,
    to: SubAccount,
    value: U256,
) -> Result<Vec<Operation>, TracerError> {
    Ok(Operation::transfer(
        kind,
        AccountId::sub(account, from),
        AccountId::sub(account, to),
        value,
    )?
    .to_vec())
}

fn with_group(
    operations: Vec<Operation>,
    group: Address,
) -> Vec<Operation> {
    operations
        .into_iter()
        .map(|op| op.with_metadata(OpMetadata::Group(group)))
        .collect()
}

/// Decodes `log` as `E`, turning unknown events into `None`.
fn decode_known<E: ContractEvent>(log: &Log) -> Result<Option<E>, DecodeError> {
    match E::decode(log) {
        Ok(event) => Ok(Some(event)),
        Err(err) if err.is_unknown_event() => {
            warn!(
                contract = E::CONTRACT,
                address = %log.address,
                selector = ?log.selector(),
                "skipping unknown event"
            );
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

fn map_accounts(event: AccountsEvent) -> Option<MappedEvent> {
    let (kind, account, metadata) = match event {
        AccountsEvent::AccountCreated { account } => (OpKind::CreateAccount, account, None),
        AccountsEvent::VoteSignerAuthorized { account, signer } => {
            (
                OpKind::AuthorizeVoteSigner,
                account,
                Some(OpMetadata::Signer(signer)),
            )
        },
        AccountsEvent::ValidatorSignerAuthorized { account, signer } => {
            (
                OpKind::AuthorizeValidatorSigner,
                account,
                Some(OpMetadata::Signer(signer)),
            )
        },
        AccountsEvent::AttestationSignerAuthorized { account, signer } => {
            (
                OpKind::AuthorizeAttestationSigner,
                account,
                Some(OpMetadata::Signer(signer)),
            )
        },
        AccountsEvent::ProfileUpdated { .. } => return None,
    };

    Some(MappedEvent::plain(vec![Operation::marker(
        kind, account, metadata,
    )]))
}

fn map_locked_gold(
    event: LockedGoldEvent,
    contracts: &CoreContracts,
) -> Result<Option<MappedEvent>, TracerError> {
    let mapped = match event {
        LockedGoldEvent::GoldLocked { value, .. } if value.is_zero() => return Ok(None),
        LockedGoldEvent::GoldLocked { account, value } => {
            MappedEvent {
                operations: move_between(
                    OpKind::Lock,
                    account,
                    SubAccount::Main,
                    SubAccount::LockedGoldNonVoting,
                    value,
                )?,
                settles: Some(Settlement {
                    kind: OpKind::Lock,
                    from: account,
                    to: contracts.locked_gold,
                    value,
                }),
            }
        },
        LockedGoldEvent::GoldRelocked { account, value } => {
            MappedEvent::plain(move_between(
                OpKind::Relock,
                account,
                SubAccount::LockedGoldPending,
                SubAccount::LockedGoldNonVoting,
                value,
            )?)
        },
        LockedGoldEvent::GoldUnlocked { account, value, .. } => {
            MappedEvent::plain(move_between(
                OpKind::Unlock,
                account,
                SubAccount::LockedGoldNonVoting,
                SubAccount::LockedGoldPending,
                value,
            )?)
        },
        LockedGoldEvent::GoldWithdrawn { value, .. } if value.is_zero() => return Ok(None),
        LockedGoldEvent::GoldWithdrawn { account, value } => {
            MappedEvent {
                operations: move_between(
                    OpKind::Withdraw,
                    account,
                    SubAccount::LockedGoldPending,
                    SubAccount::Main,
                    value,
                )?,
                settles: Some(Settlement {
                    kind: OpKind::Withdraw,
                    from: contracts.locked_gold,
                    to: account,
                    value,
                }),
            }
        },
        LockedGoldEvent::AccountSlashed {
            slashed,
            penalty,
            reporter,
            reward,
        } => {
            let governance = contracts
                .governance
                .ok_or(TracerError::MissingContract {
                    contract: ContractId::Governance,
                })?;
            let locked = AccountId::sub(slashed, SubAccount::LockedGoldNonVoting);

            let mut operations = Vec::with_capacity(4);
            if !reward.is_zero() {
                operations.extend(Operation::transfer(
                    OpKind::Slash,
                    locked,
                    AccountId::sub(reporter, SubAccount::LockedGoldNonVoting),
                    reward,
                )?);
            }

            let remainder = penalty.saturating_sub(reward);
            let settles = if remainder.is_zero() {
                None
            } else {
                operations.extend(Operation::transfer(
                    OpKind::Slash,
                    locked,
                    AccountId::main(governance),
                    remainder,
                )?);
                Some(Settlement {
                    kind: OpKind::Slash,
                    from: contracts.locked_gold,
                    to: governance,
                    value: remainder,
                })
            };

            MappedEvent {
                operations,
                settles,
            }
        },
    };

    Ok(Some(mapped))
}

fn map_election(event: ElectionEvent) -> Result<MappedEvent, TracerError> {
    let (kind, account, group, value, from, to) = match event {
        ElectionEvent::VoteCast {
            account,
            group,
            value,
        } => {
            (
                OpKind::Vote,
                account,
                group,
                value,
                SubAccount::LockedGoldNonVoting,
                SubAccount::LockedGoldVotingPending,
            )
        },
        ElectionEvent::VoteActivated {
            account,
            group,
            value,
        } => {
            (
                OpKind::ActivateVotes,
                account,
                group,
                value,
                SubAccount::LockedGoldVotingPending,
                SubAccount::LockedGoldVotingActive,
            )
        },
        ElectionEvent::PendingVoteRevoked {
            account,
            group,
            value,
        } => {
            (
                OpKind::RevokePendingVotes,
                account,
                group,
                value,
                SubAccount::LockedGoldVotingPending,
                SubAccount::LockedGoldNonVoting,
            )
        },
        ElectionEvent::ActiveVoteRevoked {
            account,
            group,
            value,
        } => {
            (
                OpKind::RevokeActiveVotes,
                account,
                group,
                value,
                SubAccount::LockedGoldVotingActive,
                SubAccount::LockedGoldNonVoting,
            )
        },
    };

    let operations = move_between(kind, account, from, to, value)?;
    Ok(MappedEvent::plain(with_group(operations, group)))
}

/// Maps the logs of one successful transaction, in emission order.
pub fn map_logs(
    logs: &[Log],
    contracts: &CoreContracts,
) -> Result<Vec<MappedEvent>, TracerError> {
    let mut mapped = Vec::new();

    for log in logs.iter().filter(|log| !is_proxy_log(log)) {
        let event = if log.address == contracts.accounts {
            decode_known::<AccountsEvent>(log)?.and_then(map_accounts)
        } else if log.address == contracts.locked_gold {
            match decode_known::<LockedGoldEvent>(log)? {
                Some(event) => map_locked_gold(event, contracts)?,
                None => None,
            }
        } else if log.address == contracts.election {
            decode_known::<ElectionEvent>(log)?
                .map(map_election)
                .transpose()?
        } else {
            None
        };

        mapped.extend(event);
    }

    Ok(mapped)
}
