use crate::{
    AdminSet, Address, Amount, Period, PoolError, PoolId, PurchaseLedger, Schedule, TokenId,
    Whitelist,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sale parameters; editable until the pool is marked ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub ido_start_time: u64,
    pub ido_end_time: u64,
    pub claim_start_time: u64,
    /// Purchase-token amount the sale honors.
    pub hard_cap: Amount,
    /// Supply-token amount sold when the cap is filled.
    pub ido_supply: Amount,
    pub minimum_purchase_amount: Amount,
    /// Receives the proceeds and unsold supply on `withdraw`.
    pub purchase_token_recipient: Address,
}

impl PoolParams {
    pub fn schedule(&self) -> Schedule {
        Schedule {
            ido_start_time: self.ido_start_time,
            ido_end_time: self.ido_end_time,
            claim_start_time: self.claim_start_time,
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        self.schedule().validate()?;
        if self.hard_cap == 0 {
            return Err(PoolError::InvalidHardCap);
        }
        Ok(())
    }
}

/// One sale. The engine is its only writer; callers get clones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub creator: Address,
    pub created_at: u64,
    /// Ledger account holding both tokens for this pool.
    pub vault: Address,
    pub supply_token: TokenId,
    pub purchase_token: TokenId,
    pub params: PoolParams,
    pub admins: AdminSet,
    pub paused: bool,
    /// Set once by `set_pool_ready`, never cleared.
    pub ready: bool,
    pub withdrawn: bool,
    pub whitelist: Whitelist,
    pub purchases: PurchaseLedger,
    pub claimed: BTreeSet<Address>,
}

impl Pool {
    pub(crate) fn new(
        id: PoolId,
        creator: Address,
        vault: Address,
        supply_token: TokenId,
        purchase_token: TokenId,
        params: PoolParams,
        now: u64,
    ) -> Result<Self, PoolError> {
        if supply_token == purchase_token {
            return Err(PoolError::InvalidFungibleAssetPair);
        }
        params.validate()?;
        Ok(Self {
            id,
            creator,
            created_at: now,
            vault,
            supply_token,
            purchase_token,
            params,
            admins: AdminSet::new(creator),
            paused: false,
            ready: false,
            withdrawn: false,
            whitelist: Whitelist::default(),
            purchases: PurchaseLedger::default(),
            claimed: BTreeSet::new(),
        })
    }

    pub fn schedule(&self) -> Schedule {
        self.params.schedule()
    }

    pub fn period(&self, now: u64) -> Period {
        self.schedule().period(self.ready, now)
    }

    pub fn is_claimed(&self, who: &Address) -> bool {
        self.claimed.contains(who)
    }

    pub fn oversubscribed(&self) -> bool {
        self.purchases.total_purchased() > self.params.hard_cap
    }

    pub(crate) fn require_edit(&self) -> Result<(), PoolError> {
        Schedule::require_edit(self.paused, self.ready)
    }

    pub(crate) fn require_ido(&self, now: u64) -> Result<(), PoolError> {
        self.schedule().require_ido(self.paused, self.ready, now)
    }

    pub(crate) fn require_claim(&self, now: u64) -> Result<(), PoolError> {
        self.schedule().require_claim(self.paused, self.ready, now)
    }
}
