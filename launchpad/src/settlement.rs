use crate::{mul_div, Address, Amount, LedgerError, LedgerGateway, Pool, PoolError, PoolEvent, TokenId};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Largest vault shortfall, in base units, a settlement transfer may absorb.
pub const TOLERANCE: Amount = 100;

/// A validated transfer out of a vault, ready to execute.
///
/// Settlement plans every leg before executing any, so a leg that cannot be
/// paid fails the call before value moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TransferPlan {
    pub token: TokenId,
    pub from: Address,
    pub to: Address,
    pub expected: Amount,
    pub actual: Amount,
}

impl TransferPlan {
    /// Exact transfer; the vault must hold `amount`.
    pub fn exact<L: LedgerGateway>(
        ledger: &L,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Self, PoolError> {
        if amount > 0 {
            let available = ledger.balance_of(token, from)?;
            if available < amount {
                return Err(LedgerError::Insufficient { available, requested: amount }.into());
            }
        }
        Ok(Self { token, from, to, expected: amount, actual: amount })
    }

    /// Pays what the vault holds when it is short by at most `TOLERANCE`.
    pub fn tolerant<L: LedgerGateway>(
        ledger: &L,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Self, PoolError> {
        if amount == 0 {
            return Ok(Self { token, from, to, expected: 0, actual: 0 });
        }
        let balance = ledger.balance_of(token, from)?;
        let actual = if amount <= balance {
            amount
        } else {
            let shortfall = amount - balance;
            if shortfall > TOLERANCE {
                error!(target: "launchpad", ?token, %from, %to, amount, balance, shortfall, "vault shortfall exceeds tolerance");
                return Err(PoolError::ToleranceExceeded { shortfall });
            }
            balance
        };
        Ok(Self { token, from, to, expected: amount, actual })
    }

    /// Returns an executed leg to its vault.
    fn revert<L: LedgerGateway>(&self, ledger: &L) {
        if self.actual == 0 {
            return;
        }
        if let Err(e) = ledger.transfer(self.token, self.to, self.from, self.actual) {
            error!(
                target: "launchpad",
                token = ?self.token,
                from = %self.to,
                to = %self.from,
                amount = self.actual,
                error = %e,
                "failed to revert settlement leg"
            );
        }
    }

    /// Moves `actual`; yields a `TransferLoss` when less than `expected` was paid.
    pub fn execute<L: LedgerGateway>(&self, ledger: &L) -> Result<Option<PoolEvent>, PoolError> {
        if self.actual > 0 {
            ledger.transfer(self.token, self.from, self.to, self.actual)?;
        }
        if self.actual == self.expected {
            return Ok(None);
        }
        warn!(
            target: "launchpad",
            token = ?self.token,
            from = %self.from,
            to = %self.to,
            expected = self.expected,
            actual = self.actual,
            "absorbed settlement transfer loss"
        );
        Ok(Some(PoolEvent::TransferLoss {
            token: self.token,
            from: self.from,
            to: self.to,
            expected_amount: self.expected,
            actual_amount: self.actual,
        }))
    }
}

/// Runs `legs` in order. If one fails, every leg already paid is sent back
/// to its vault before the error is returned, so the call moves nothing.
pub(crate) fn execute_all<L: LedgerGateway>(ledger: &L, legs: &[TransferPlan]) -> Result<Vec<PoolEvent>, PoolError> {
    let mut losses = Vec::new();
    for (i, leg) in legs.iter().enumerate() {
        match leg.execute(ledger) {
            Ok(loss) => losses.extend(loss),
            Err(e) => {
                for done in legs[..i].iter().rev() {
                    done.revert(ledger);
                }
                return Err(e);
            }
        }
    }
    Ok(losses)
}

/// What `withdraw` pays the purchase token recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Purchase tokens kept by the sale.
    pub purchase_amount: Amount,
    /// Supply tokens left unsold.
    pub supply_amount: Amount,
}

/// Operator proceeds. A filled cap keeps `hard_cap` and sells the whole supply
/// (rounding dust is not reclaimed); otherwise the unsold supply goes back.
pub fn withdrawal_amounts(pool: &Pool) -> Result<Withdrawal, PoolError> {
    let total = pool.purchases.total_purchased();
    let hard_cap = pool.params.hard_cap;
    if total > hard_cap {
        return Ok(Withdrawal { purchase_amount: hard_cap, supply_amount: 0 });
    }
    let sold = mul_div(total, pool.params.ido_supply, hard_cap).ok_or(PoolError::MathOverflow)?;
    Ok(Withdrawal { purchase_amount: total, supply_amount: pool.params.ido_supply - sold })
}
