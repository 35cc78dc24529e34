use crate::{Address, Amount, Pool, PoolError};
use serde::{Deserialize, Serialize};

/// Point-in-time entitlement of one address. Derived on every call, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimable {
    pub address: Address,
    pub protected_amount: Amount,
    pub claimed: bool,
    /// Supply tokens owed.
    pub claimable: Amount,
    pub purchased: Amount,
    /// Purchase tokens returned.
    pub refund: Amount,
}

impl Claimable {
    fn empty(address: Address) -> Self {
        Self { address, protected_amount: 0, claimed: false, claimable: 0, purchased: 0, refund: 0 }
    }

    /// Part of the purchase honored by the sale.
    pub fn fill(&self) -> Amount {
        self.purchased - self.refund
    }
}

/// floor(a * b / d) through a 128-bit intermediate; None when `d == 0` or the result leaves u64.
pub fn mul_div(a: Amount, b: Amount, d: Amount) -> Option<Amount> {
    if d == 0 {
        return None;
    }
    let q = u128::from(a) * u128::from(b) / u128::from(d);
    Amount::try_from(q).ok()
}

/// Entitlement of `who` under the pool's current state.
///
/// Up to the hard cap every purchase is honored in full. Above it, protected
/// demand is filled first and the remaining room under the cap is shared
/// pro-rata across unprotected demand. Every division floors, so dust stays
/// in the vault rather than being over-allocated.
pub fn claimable_for(pool: &Pool, who: Address) -> Result<Claimable, PoolError> {
    let purchased = pool.purchases.purchased(&who);
    if purchased == 0 {
        return Ok(Claimable::empty(who));
    }
    let protected = pool.whitelist.get(&who);
    let hard_cap = pool.params.hard_cap;

    let fill = if pool.oversubscribed() {
        oversubscribed_fill(
            purchased,
            protected,
            hard_cap,
            pool.purchases.total_purchased(),
            pool.purchases.total_purchased_protected(),
        )?
    } else {
        purchased
    };
    let claimable = mul_div(fill, pool.params.ido_supply, hard_cap).ok_or(PoolError::MathOverflow)?;

    Ok(Claimable {
        address: who,
        protected_amount: protected,
        claimed: pool.is_claimed(&who),
        claimable,
        purchased,
        refund: purchased - fill,
    })
}

fn oversubscribed_fill(
    purchased: Amount,
    protected: Amount,
    hard_cap: Amount,
    total_purchased: Amount,
    total_purchased_protected: Amount,
) -> Result<Amount, PoolError> {
    if protected >= purchased {
        return Ok(purchased);
    }
    // tpp <= protected sum <= hard_cap < total_purchased
    let room = hard_cap.saturating_sub(total_purchased_protected);
    let unprotected = total_purchased - total_purchased_protected;
    let share = mul_div(purchased - protected, room, unprotected).ok_or(PoolError::MathOverflow)?;
    Ok(protected + share)
}
