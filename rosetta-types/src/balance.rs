use std::collections::BTreeMap;

use alloy_primitives::Address;
use alloy_primitives::I256;
use alloy_primitives::U256;

use crate::operation::signed;
use crate::AccountId;
use crate::AmountOverflow;
use crate::OpKind;
use crate::Operation;
use crate::SubAccount;

/// Signed balance changes accumulated per account.
///
/// Operations are produced in address order, so the output does not depend on
/// the order contributions were made in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceSet {
    entries: BTreeMap<AccountId, I256>,
}

impl BalanceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(
        &mut self,
        address: Address,
        sub_account: SubAccount,
        value: U256,
    ) -> Result<(), AmountOverflow> {
        let amount = signed(value)?;
        self.add(AccountId::sub(address, sub_account), amount, value)
    }

    pub fn debit(
        &mut self,
        address: Address,
        sub_account: SubAccount,
        value: U256,
    ) -> Result<(), AmountOverflow> {
        let amount = signed(value)?;
        self.add(AccountId::sub(address, sub_account), -amount, value)
    }

    fn add(
        &mut self,
        account: AccountId,
        amount: I256,
        value: U256,
    ) -> Result<(), AmountOverflow> {
        let entry = self
            .entries
            .entry(account)
            .or_insert(I256::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or(AmountOverflow(value))?;
        Ok(())
    }

    /// Sum of all entries. Zero for a balanced set.
    pub fn total(&self) -> I256 {
        self.entries
            .values()
            .fold(I256::ZERO, |acc, v| acc.saturating_add(*v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .values()
            .all(|v| v.is_zero())
    }

    pub fn into_operations(
        self,
        kind: OpKind,
    ) -> Vec<Operation> {
        self.entries
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(account, amount)| Operation::new(kind, account, amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contributions_accumulate_per_account() {
        let sender = Address::with_last_byte(0x0a);
        let miner = Address::with_last_byte(0x0b);

        let mut set = BalanceSet::new();
        set.debit(sender, SubAccount::Main, U256::from(30))
            .unwrap();
        set.credit(miner, SubAccount::Main, U256::from(20))
            .unwrap();
        set.credit(miner, SubAccount::Main, U256::from(10))
            .unwrap();

        assert_eq!(set.total(), I256::ZERO);

        let ops = set.into_operations(OpKind::Fee);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].account, AccountId::main(sender));
        assert_eq!(ops[0].amount, I256::try_from(-30i64).unwrap());
        assert_eq!(ops[1].account, AccountId::main(miner));
        assert_eq!(ops[1].amount, I256::try_from(30i64).unwrap());
        assert!(ops.iter().all(|op| op.kind == OpKind::Fee));
    }

    #[test]
    fn test_zero_entries_are_dropped() {
        let addr = Address::with_last_byte(1);

        let mut set = BalanceSet::new();
        set.credit(addr, SubAccount::Main, U256::from(5))
            .unwrap();
        set.debit(addr, SubAccount::Main, U256::from(5))
            .unwrap();

        assert!(set.is_empty());
        assert!(set
            .into_operations(OpKind::Fee)
            .is_empty());
    }

    #[test]
    fn test_output_is_ordered_by_address() {
        let mut set = BalanceSet::new();
        set.credit(Address::with_last_byte(9), SubAccount::Main, U256::from(1))
            .unwrap();
        set.debit(Address::with_last_byte(2), SubAccount::Main, U256::from(1))
            .unwrap();

        let ops = set.into_operations(OpKind::Fee);
        assert_eq!(ops[0].account.address, Address::with_last_byte(2));
        assert_eq!(ops[1].account.address, Address::with_last_byte(9));
    }
}
