use std::fmt::Display;
use std::fmt::Formatter;

/// Core contracts looked up through the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractId {
    Accounts,
    Election,
    FeeHandler,
    GasPriceMinimum,
    Governance,
    LockedGold,
}

impl ContractId {
    /// The identifier the registry stores the contract under.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractId::Accounts => "Accounts",
            ContractId::Election => "Election",
            ContractId::FeeHandler => "FeeHandler",
            ContractId::GasPriceMinimum => "GasPriceMinimum",
            ContractId::Governance => "Governance",
            ContractId::LockedGold => "LockedGold",
        }
    }
}

impl Display for ContractId {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for ContractId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
