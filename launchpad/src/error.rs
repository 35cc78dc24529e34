use crate::{Amount, PoolId};
use thiserror::Error;

/// Failures reported by a `LedgerGateway`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance: have {available}, need {requested}")]
    Insufficient { available: Amount, requested: Amount },
    #[error("token not supported")]
    UnsupportedToken,
    #[error("ledger failure: {0}")]
    Other(String),
}

/// Every pool operation aborts as a whole with one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // authorization
    #[error("caller is not a pool admin")]
    NotAdmin,
    #[error("caller is not the purchase token recipient")]
    NotRecipient,

    // period
    #[error("pool is paused")]
    Paused,
    #[error("pool is not ready")]
    NotReady,
    #[error("pool is already ready")]
    AlreadyReady,
    #[error("ido already started")]
    AlreadyStarted,
    #[error("ido not started")]
    NotStarted,
    #[error("ido already finished")]
    AlreadyFinished,
    #[error("claim period not started")]
    ClaimNotStarted,
    #[error("invalid times: require ido_start < ido_end <= claim_start")]
    InvalidTimes,

    // configuration
    #[error("vault supply balance {actual} does not match ido_supply {expected}")]
    InvalidSupply { expected: Amount, actual: Amount },
    #[error("protected amount {protected} exceeds hard cap {hard_cap}")]
    ProtectedExceedsCap { protected: Amount, hard_cap: Amount },
    #[error("supply token and purchase token must differ")]
    InvalidFungibleAssetPair,
    #[error("hard cap must be > 0")]
    InvalidHardCap,

    // purchase
    #[error("amount must be > 0")]
    InvalidAmount,
    #[error("amount {amount} below minimum purchase {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    // claim
    #[error("already claimed")]
    AlreadyClaimed,
    #[error("nothing claimable")]
    NothingClaimable,

    // settlement
    #[error("transfer shortfall {shortfall} exceeds tolerance")]
    ToleranceExceeded { shortfall: Amount },
    #[error("proceeds already withdrawn")]
    AlreadyWithdrawn,

    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),
    #[error("arithmetic overflow")]
    MathOverflow,
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

impl PoolError {
    /// True when the failure signals a broken conservation invariant rather than caller error.
    pub fn is_invariant_breach(&self) -> bool {
        matches!(self, PoolError::ToleranceExceeded { .. })
    }
}
