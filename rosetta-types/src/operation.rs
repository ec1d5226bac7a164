use std::fmt::Display;
use std::fmt::Formatter;

use alloy_primitives::Address;
use alloy_primitives::I256;
use alloy_primitives::U256;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_with::serde_as;
use serde_with::DisplayFromStr;
use thiserror::Error;

/// A balance partition of one address.
#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SubAccount {
    /// The spendable balance.
    #[default]
    Main,
    /// Locked and not voting.
    LockedGoldNonVoting,
    /// Unlocked, waiting for the unlocking period before withdrawal.
    LockedGoldPending,
    /// Voting for a group, not yet activated.
    LockedGoldVotingPending,
    /// Activated votes.
    LockedGoldVotingActive,
}

impl Display for SubAccount {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SubAccount::Main => "main",
                SubAccount::LockedGoldNonVoting => "locked_gold_non_voting",
                SubAccount::LockedGoldPending => "locked_gold_pending",
                SubAccount::LockedGoldVotingPending => "locked_gold_voting_pending",
                SubAccount::LockedGoldVotingActive => "locked_gold_voting_active",
            }
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId {
    pub address: Address,
    pub sub_account: SubAccount,
}

impl AccountId {
    pub fn main(address: Address) -> Self {
        Self {
            address,
            sub_account: SubAccount::Main,
        }
    }

    pub fn sub(
        address: Address,
        sub_account: SubAccount,
    ) -> Self {
        Self {
            address,
            sub_account,
        }
    }
}

impl Display for AccountId {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.sub_account)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Fee,
    Transfer,
    CreateAccount,
    AuthorizeVoteSigner,
    AuthorizeValidatorSigner,
    AuthorizeAttestationSigner,
    Lock,
    Relock,
    Unlock,
    Withdraw,
    Slash,
    Vote,
    ActivateVotes,
    RevokePendingVotes,
    RevokeActiveVotes,
}

impl Display for OpKind {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                OpKind::Fee => "fee",
                OpKind::Transfer => "transfer",
                OpKind::CreateAccount => "create_account",
                OpKind::AuthorizeVoteSigner => "authorize_vote_signer",
                OpKind::AuthorizeValidatorSigner => "authorize_validator_signer",
                OpKind::AuthorizeAttestationSigner => "authorize_attestation_signer",
                OpKind::Lock => "lock",
                OpKind::Relock => "relock",
                OpKind::Unlock => "unlock",
                OpKind::Withdraw => "withdraw",
                OpKind::Slash => "slash",
                OpKind::Vote => "vote",
                OpKind::ActivateVotes => "activate_votes",
                OpKind::RevokePendingVotes => "revoke_pending_votes",
                OpKind::RevokeActiveVotes => "revoke_active_votes",
            }
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// The native currency, the only one fees are tracked in.
    #[serde(rename = "CELO")]
    Celo,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Celo => "CELO",
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Currency::Celo => 18,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpMetadata {
    /// The validator group a vote is cast for.
    Group(Address),
    /// The signer being authorized.
    Signer(Address),
}

/// A single signed balance change of one account.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,

    pub account: AccountId,

    #[serde_as(as = "DisplayFromStr")]
    pub amount: I256,

    pub currency: Currency,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OpMetadata>,
}

impl Operation {
    pub fn new(
        kind: OpKind,
        account: AccountId,
        amount: I256,
    ) -> Self {
        Self {
            kind,
            account,
            amount,
            currency: Currency::Celo,
            metadata: None,
        }
    }

    /// An operation that records an event without moving funds.
    pub fn marker(
        kind: OpKind,
        address: Address,
        metadata: Option<OpMetadata>,
    ) -> Self {
        Self {
            metadata,
            ..Self::new(kind, AccountId::main(address), I256::ZERO)
        }
    }

    pub fn with_metadata(
        mut self,
        metadata: OpMetadata,
    ) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The debit and credit pair moving `value` from `from` to `to`.
    pub fn transfer(
        kind: OpKind,
        from: AccountId,
        to: AccountId,
        value: U256,
    ) -> Result<[Operation; 2], AmountOverflow> {
        let amount = signed(value)?;
        Ok([
            Self::new(kind, from, -amount),
            Self::new(kind, to, amount),
        ])
    }
}

/// Raised for unsigned amounts that do not fit a signed 256-bit integer.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("amount {0} does not fit a signed 256-bit integer")]
pub struct AmountOverflow(pub U256);

pub fn signed(value: U256) -> Result<I256, AmountOverflow> {
    I256::try_from(value).map_err(|_| AmountOverflow(value))
}

/// A value movement captured by the node's transfer tracer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    /// `false` when the enclosing call frame reverted.
    pub succeeded: bool,
}
