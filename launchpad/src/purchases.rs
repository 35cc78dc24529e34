use crate::{Address, Amount, PoolError, Whitelist};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cumulative purchases per address plus the sale-wide aggregates.
///
/// `total_purchased_protected` is a cached projection of
/// `sum(min(purchased[a], whitelist[a]))`, kept current on every `record`.
/// `recompute_protected` derives it from scratch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLedger {
    purchased: HashMap<Address, Amount>,
    total_purchased: Amount,
    total_purchased_protected: Amount,
}

impl PurchaseLedger {
    /// Cumulative purchase of `who`, 0 when absent.
    pub fn purchased(&self, who: &Address) -> Amount {
        self.purchased.get(who).copied().unwrap_or(0)
    }

    pub fn total_purchased(&self) -> Amount {
        self.total_purchased
    }

    pub fn total_purchased_protected(&self) -> Amount {
        self.total_purchased_protected
    }

    pub fn participants(&self) -> usize {
        self.purchased.len()
    }

    pub fn buyers(&self) -> impl Iterator<Item = &Address> {
        self.purchased.keys()
    }

    /// Books `amount` for `buyer` whose protected amount is `protected`.
    /// Returns the slice of this purchase that landed inside the protection.
    pub fn record(&mut self, buyer: Address, amount: Amount, protected: Amount) -> Result<Amount, PoolError> {
        let staged = self.stage(buyer, amount, protected)?;
        Ok(self.commit(staged))
    }

    /// Validates a purchase without booking it.
    pub(crate) fn stage(&self, buyer: Address, amount: Amount, protected: Amount) -> Result<StagedPurchase, PoolError> {
        let old = self.purchased(&buyer);
        let purchased = old.checked_add(amount).ok_or(PoolError::MathOverflow)?;
        let total_purchased = self.total_purchased.checked_add(amount).ok_or(PoolError::MathOverflow)?;

        let protected_delta = if protected > old { purchased.min(protected) - old } else { 0 };
        let total_purchased_protected = self
            .total_purchased_protected
            .checked_add(protected_delta)
            .ok_or(PoolError::MathOverflow)?;

        Ok(StagedPurchase { buyer, purchased, total_purchased, total_purchased_protected, protected_delta })
    }

    /// Books a purchase produced by `stage` against this same ledger state.
    pub(crate) fn commit(&mut self, staged: StagedPurchase) -> Amount {
        self.purchased.insert(staged.buyer, staged.purchased);
        self.total_purchased = staged.total_purchased;
        self.total_purchased_protected = staged.total_purchased_protected;
        staged.protected_delta
    }

    /// `sum(min(purchased[a], whitelist[a]))` over all buyers.
    pub fn recompute_protected(&self, whitelist: &Whitelist) -> u128 {
        self.purchased
            .iter()
            .map(|(who, p)| u128::from((*p).min(whitelist.get(who))))
            .sum()
    }
}

/// Post-purchase values computed by `PurchaseLedger::stage`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StagedPurchase {
    buyer: Address,
    purchased: Amount,
    total_purchased: Amount,
    total_purchased_protected: Amount,
    protected_delta: Amount,
}
