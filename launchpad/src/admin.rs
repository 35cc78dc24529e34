use crate::{Address, PoolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Addresses allowed to mutate a pool.
///
/// Removing every admin is permitted and locks the pool against further
/// admin-gated calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSet {
    members: BTreeSet<Address>,
}

impl AdminSet {
    pub fn new(creator: Address) -> Self {
        Self { members: BTreeSet::from([creator]) }
    }

    pub fn contains(&self, who: &Address) -> bool {
        self.members.contains(who)
    }

    pub fn require(&self, caller: &Address) -> Result<(), PoolError> {
        if self.contains(caller) {
            Ok(())
        } else {
            Err(PoolError::NotAdmin)
        }
    }

    /// Returns how many addresses were newly added.
    pub fn add(&mut self, caller: &Address, admins: &[Address]) -> Result<usize, PoolError> {
        self.require(caller)?;
        Ok(admins.iter().filter(|a| self.members.insert(**a)).count())
    }

    /// Returns how many addresses were actually removed.
    pub fn remove(&mut self, caller: &Address, admins: &[Address]) -> Result<usize, PoolError> {
        self.require(caller)?;
        Ok(admins.iter().filter(|a| self.members.remove(*a)).count())
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.members.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
