use crate::PoolError;
use serde::{Deserialize, Serialize};

/// Pool period derived from the ready flag and the clock. Only `ready` is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// Not ready yet; configuration, whitelist and supply deposit are open.
    Edit,
    /// Ready, waiting for `ido_start_time`.
    Pending,
    /// `ido_start_time <= now < ido_end_time`; purchases are open.
    Ido,
    /// Sale over, waiting for `claim_start_time`.
    Closed,
    /// `now >= claim_start_time`; terminal.
    Claim,
}

/// Sale timeline, UNIX seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub ido_start_time: u64,
    pub ido_end_time: u64,
    pub claim_start_time: u64,
}

impl Schedule {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.ido_start_time < self.ido_end_time && self.ido_end_time <= self.claim_start_time {
            Ok(())
        } else {
            Err(PoolError::InvalidTimes)
        }
    }

    pub fn period(&self, ready: bool, now: u64) -> Period {
        if !ready {
            return Period::Edit;
        }
        if now < self.ido_start_time {
            Period::Pending
        } else if now < self.ido_end_time {
            Period::Ido
        } else if now < self.claim_start_time {
            Period::Closed
        } else {
            Period::Claim
        }
    }

    /// Edit-only operations; `paused` wins over every period check.
    pub(crate) fn require_edit(paused: bool, ready: bool) -> Result<(), PoolError> {
        if paused {
            return Err(PoolError::Paused);
        }
        if ready {
            return Err(PoolError::AlreadyReady);
        }
        Ok(())
    }

    pub(crate) fn require_ido(&self, paused: bool, ready: bool, now: u64) -> Result<(), PoolError> {
        if paused {
            return Err(PoolError::Paused);
        }
        if !ready {
            return Err(PoolError::NotReady);
        }
        if now < self.ido_start_time {
            return Err(PoolError::NotStarted);
        }
        if now >= self.ido_end_time {
            return Err(PoolError::AlreadyFinished);
        }
        Ok(())
    }

    pub(crate) fn require_claim(&self, paused: bool, ready: bool, now: u64) -> Result<(), PoolError> {
        if paused {
            return Err(PoolError::Paused);
        }
        if !ready {
            return Err(PoolError::NotReady);
        }
        if now < self.claim_start_time {
            return Err(PoolError::ClaimNotStarted);
        }
        Ok(())
    }
}
