pub mod balance;
pub mod chain;
pub mod change_set;
pub mod contract;
pub mod operation;

pub use balance::BalanceSet;
pub use chain::BlockHeader;
pub use chain::Log;
pub use chain::Receipt;
pub use chain::Transaction;
pub use change_set::BlockChangeSet;
pub use change_set::RegistryBinding;
pub use change_set::RegistryChange;
pub use contract::ContractId;
pub use operation::AccountId;
pub use operation::AmountOverflow;
pub use operation::Currency;
pub use operation::OpKind;
pub use operation::OpMetadata;
pub use operation::Operation;
pub use operation::SubAccount;
pub use operation::TransferRecord;

pub type BlockNr = u64;
pub type TxIndex = u32;
