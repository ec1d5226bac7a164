//! Event decoders of the core contracts.
//!
//! Each contract gets a tagged enum over the events the indexer understands.
//! Decoding a log whose signature is not in the enum yields
//! [`DecodeError::UnknownEvent`], a recognized signature with a bad payload
//! yields [`DecodeError::Malformed`].

use alloy_primitives::Address;
use alloy_primitives::B256;
use alloy_primitives::U256;
use alloy_sol_types::sol;
use alloy_sol_types::SolEvent;
use rosetta_types::Log;
use thiserror::Error;

sol! {
    interface IAccounts {
        event AccountCreated(address indexed account);
        event VoteSignerAuthorized(address indexed account, address signer);
        event ValidatorSignerAuthorized(address indexed account, address signer);
        event AttestationSignerAuthorized(address indexed account, address signer);
        event AccountNameSet(address indexed account, string name);
        event AccountWalletAddressSet(address indexed account, address walletAddress);
        event AccountDataEncryptionKeySet(address indexed account, bytes dataEncryptionKey);
        event AccountMetadataURLSet(address indexed account, string metadataURL);
    }

    interface ILockedGold {
        event GoldLocked(address indexed account, uint256 value);
        event GoldUnlocked(address indexed account, uint256 value, uint256 available);
        event GoldRelocked(address indexed account, uint256 value);
        event GoldWithdrawn(address indexed account, uint256 value);
        event AccountSlashed(
            address indexed slashed,
            uint256 penalty,
            address indexed reporter,
            uint256 reward
        );
    }

    interface IElection {
        event ValidatorGroupVoteCast(address indexed account, address indexed group, uint256 value);
        event ValidatorGroupVoteActivated(
            address indexed account,
            address indexed group,
            uint256 value,
            uint256 units
        );
        event ValidatorGroupPendingVoteRevoked(
            address indexed account,
            address indexed group,
            uint256 value
        );
        event ValidatorGroupActiveVoteRevoked(
            address indexed account,
            address indexed group,
            uint256 value,
            uint256 units
        );
    }

    interface IRegistry {
        event RegistryUpdated(string identifier, bytes32 indexed identifierHash, address indexed addr);
    }

    interface IGasPriceMinimum {
        event GasPriceMinimumUpdated(uint256 gasPriceMinimum);
    }

    interface IProxy {
        event OwnerSet(address indexed owner);
        event ImplementationSet(address indexed implementation);
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{contract} emitted an unknown event {selector:?}")]
    UnknownEvent {
        contract: &'static str,
        selector: Option<B256>,
    },

    #[error("malformed {event} log: {source}")]
    Malformed {
        event: &'static str,
        source: alloy_sol_types::Error,
    },
}

impl DecodeError {
    pub fn is_unknown_event(&self) -> bool {
        matches!(self, DecodeError::UnknownEvent { .. })
    }
}

/// The decodable event set of one contract.
pub trait ContractEvent: Sized {
    /// Registry identifier of the emitting contract.
    const CONTRACT: &'static str;

    fn decode(log: &Log) -> Result<Self, DecodeError>;
}

fn decode_as<E: SolEvent>(log: &Log) -> Result<E, DecodeError> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data, true).map_err(|source| {
        DecodeError::Malformed {
            event: E::SIGNATURE,
            source,
        }
    })
}

fn unknown<E: ContractEvent>(log: &Log) -> DecodeError {
    DecodeError::UnknownEvent {
        contract: E::CONTRACT,
        selector: log.selector(),
    }
}

/// Logs the upgradeable proxy in front of every core contract emits itself.
pub fn is_proxy_log(log: &Log) -> bool {
    matches!(
        log.selector(),
        Some(selector)
            if selector == IProxy::OwnerSet::SIGNATURE_HASH
                || selector == IProxy::ImplementationSet::SIGNATURE_HASH
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountsEvent {
    AccountCreated {
        account: Address,
    },
    VoteSignerAuthorized {
        account: Address,
        signer: Address,
    },
    ValidatorSignerAuthorized {
        account: Address,
        signer: Address,
    },
    AttestationSignerAuthorized {
        account: Address,
        signer: Address,
    },
    /// Name, wallet, encryption key or metadata URL changes. None moves funds.
    ProfileUpdated {
        account: Address,
    },
}

impl ContractEvent for AccountsEvent {
    const CONTRACT: &'static str = "Accounts";

    fn decode(log: &Log) -> Result<Self, DecodeError> {
        let Some(selector) = log.selector() else {
            return Err(unknown::<Self>(log));
        };

        if selector == IAccounts::AccountCreated::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::AccountCreated>(log)?;
            Ok(Self::AccountCreated {
                account: event.account,
            })
        } else if selector == IAccounts::VoteSignerAuthorized::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::VoteSignerAuthorized>(log)?;
            Ok(Self::VoteSignerAuthorized {
                account: event.account,
                signer: event.signer,
            })
        } else if selector == IAccounts::ValidatorSignerAuthorized::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::ValidatorSignerAuthorized>(log)?;
            Ok(Self::ValidatorSignerAuthorized {
                account: event.account,
                signer: event.signer,
            })
        } else if selector == IAccounts::AttestationSignerAuthorized::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::AttestationSignerAuthorized>(log)?;
            Ok(Self::AttestationSignerAuthorized {
                account: event.account,
                signer: event.signer,
            })
        } else if selector == IAccounts::AccountNameSet::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::AccountNameSet>(log)?;
            Ok(Self::ProfileUpdated {
                account: event.account,
            })
        } else if selector == IAccounts::AccountWalletAddressSet::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::AccountWalletAddressSet>(log)?;
            Ok(Self::ProfileUpdated {
                account: event.account,
            })
        } else if selector == IAccounts::AccountDataEncryptionKeySet::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::AccountDataEncryptionKeySet>(log)?;
            Ok(Self::ProfileUpdated {
                account: event.account,
            })
        } else if selector == IAccounts::AccountMetadataURLSet::SIGNATURE_HASH {
            let event = decode_as::<IAccounts::AccountMetadataURLSet>(log)?;
            Ok(Self::ProfileUpdated {
                account: event.account,
            })
        } else {
            Err(unknown::<Self>(log))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockedGoldEvent {
    GoldLocked {
        account: Address,
        value: U256,
    },
    GoldUnlocked {
        account: Address,
        value: U256,
        available: U256,
    },
    GoldRelocked {
        account: Address,
        value: U256,
    },
    GoldWithdrawn {
        account: Address,
        value: U256,
    },
    AccountSlashed {
        slashed: Address,
        penalty: U256,
        reporter: Address,
        reward: U256,
    },
}

impl ContractEvent for LockedGoldEvent {
    const CONTRACT: &'static str = "LockedGold";

    fn decode(log: &Log) -> Result<Self, DecodeError> {
        let Some(selector) = log.selector() else {
            return Err(unknown::<Self>(log));
        };

        if selector == ILockedGold::GoldLocked::SIGNATURE_HASH {
            let event = decode_as::<ILockedGold::GoldLocked>(log)?;
            Ok(Self::GoldLocked {
                account: event.account,
                value: event.value,
            })
        } else if selector == ILockedGold::GoldUnlocked::SIGNATURE_HASH {
            let event = decode_as::<ILockedGold::GoldUnlocked>(log)?;
            Ok(Self::GoldUnlocked {
                account: event.account,
                value: event.value,
                available: event.available,
            })
        } else if selector == ILockedGold::GoldRelocked::SIGNATURE_HASH {
            let event = decode_as::<ILockedGold::GoldRelocked>(log)?;
            Ok(Self::GoldRelocked {
                account: event.account,
                value: event.value,
            })
        } else if selector == ILockedGold::GoldWithdrawn::SIGNATURE_HASH {
            let event = decode_as::<ILockedGold::GoldWithdrawn>(log)?;
            Ok(Self::GoldWithdrawn {
                account: event.account,
                value: event.value,
            })
        } else if selector == ILockedGold::AccountSlashed::SIGNATURE_HASH {
            let event = decode_as::<ILockedGold::AccountSlashed>(log)?;
            Ok(Self::AccountSlashed {
                slashed: event.slashed,
                penalty: event.penalty,
                reporter: event.reporter,
                reward: event.reward,
            })
        } else {
            Err(unknown::<Self>(log))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    VoteCast {
        account: Address,
        group: Address,
        value: U256,
    },
    VoteActivated {
        account: Address,
        group: Address,
        value: U256,
    },
    PendingVoteRevoked {
        account: Address,
        group: Address,
        value: U256,
    },
    ActiveVoteRevoked {
        account: Address,
        group: Address,
        value: U256,
    },
}

impl ContractEvent for ElectionEvent {
    const CONTRACT: &'static str = "Election";

    fn decode(log: &Log) -> Result<Self, DecodeError> {
        let Some(selector) = log.selector() else {
            return Err(unknown::<Self>(log));
        };

        if selector == IElection::ValidatorGroupVoteCast::SIGNATURE_HASH {
            let event = decode_as::<IElection::ValidatorGroupVoteCast>(log)?;
            Ok(Self::VoteCast {
                account: event.account,
                group: event.group,
                value: event.value,
            })
        } else if selector == IElection::ValidatorGroupVoteActivated::SIGNATURE_HASH {
            let event = decode_as::<IElection::ValidatorGroupVoteActivated>(log)?;
            Ok(Self::VoteActivated {
                account: event.account,
                group: event.group,
                value: event.value,
            })
        } else if selector == IElection::ValidatorGroupPendingVoteRevoked::SIGNATURE_HASH {
            let event = decode_as::<IElection::ValidatorGroupPendingVoteRevoked>(log)?;
            Ok(Self::PendingVoteRevoked {
                account: event.account,
                group: event.group,
                value: event.value,
            })
        } else if selector == IElection::ValidatorGroupActiveVoteRevoked::SIGNATURE_HASH {
            let event = decode_as::<IElection::ValidatorGroupActiveVoteRevoked>(log)?;
            Ok(Self::ActiveVoteRevoked {
                account: event.account,
                group: event.group,
                value: event.value,
            })
        } else {
            Err(unknown::<Self>(log))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    RegistryUpdated { identifier: String, address: Address },
}

impl ContractEvent for RegistryEvent {
    const CONTRACT: &'static str = "Registry";

    fn decode(log: &Log) -> Result<Self, DecodeError> {
        match log.selector() {
            Some(selector) if selector == IRegistry::RegistryUpdated::SIGNATURE_HASH => {
                let event = decode_as::<IRegistry::RegistryUpdated>(log)?;
                Ok(Self::RegistryUpdated {
                    identifier: event.identifier,
                    address: event.addr,
                })
            },
            _ => Err(unknown::<Self>(log)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasPriceMinimumEvent {
    GasPriceMinimumUpdated { value: U256 },
}

impl ContractEvent for GasPriceMinimumEvent {
    const CONTRACT: &'static str = "GasPriceMinimum";

    fn decode(log: &Log) -> Result<Self, DecodeError> {
        match log.selector() {
            Some(selector) if selector == IGasPriceMinimum::GasPriceMinimumUpdated::SIGNATURE_HASH => {
                let event = decode_as::<IGasPriceMinimum::GasPriceMinimumUpdated>(log)?;
                Ok(Self::GasPriceMinimumUpdated {
                    value: event.gasPriceMinimum,
                })
            },
            _ => Err(unknown::<Self>(log)),
        }
    }
}
