use crate::{Address, Amount, PoolError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-address protected purchase amounts and their running sum.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    entries: HashMap<Address, Amount>,
    protected_amount: Amount,
}

impl Whitelist {
    /// Protected amount for `who`, 0 when absent.
    pub fn get(&self, who: &Address) -> Amount {
        self.entries.get(who).copied().unwrap_or(0)
    }

    pub fn protected_amount(&self) -> Amount {
        self.protected_amount
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.entries.iter()
    }

    /// Sets every address in `addresses` to `amount` (reset, not additive).
    ///
    /// The post-batch sum is computed before anything is written, so a batch
    /// pushing the sum above `hard_cap` leaves the whitelist untouched.
    /// Returns the new sum.
    pub fn update(&mut self, addresses: &[Address], amount: Amount, hard_cap: Amount) -> Result<Amount, PoolError> {
        let mut staged: BTreeMap<Address, Amount> = BTreeMap::new();
        let mut total = u128::from(self.protected_amount);
        for who in addresses {
            let old = staged.get(who).copied().unwrap_or_else(|| self.get(who));
            if old == amount {
                continue;
            }
            total = total - u128::from(old) + u128::from(amount);
            staged.insert(*who, amount);
        }

        if total > u128::from(hard_cap) {
            return Err(PoolError::ProtectedExceedsCap {
                protected: Amount::try_from(total).unwrap_or(Amount::MAX),
                hard_cap,
            });
        }

        for (who, amount) in staged {
            if amount == 0 {
                self.entries.remove(&who);
            } else {
                self.entries.insert(who, amount);
            }
        }
        // total <= hard_cap, so it fits
        self.protected_amount = total as Amount;
        Ok(self.protected_amount)
    }

    /// Sum recomputed from the entries.
    pub fn recompute(&self) -> u128 {
        self.entries.values().map(|v| u128::from(*v)).sum()
    }
}
