//! Aethernova Launchpad: IDO pool core
//! Features:
//! - Pool lifecycle: Edit -> Ready -> Ido -> Claim, derived from a ready flag and the clock
//! - Admin set per pool, pause switch, whitelist with protected (guaranteed) fill
//! - Oversubscription settled post-hoc: protected demand first, pro-rata for the rest
//! - Integer-only allocation math (u64 amounts, u128 intermediates, floor everywhere)
//! - Settlement absorbs rounding dust up to `TOLERANCE` and reports it as `TransferLoss`
//! - Concurrency: parking_lot RwLock arena + per-pool execute mutex
//! - Events: tokio::broadcast
//!
//! Notes:
//! - Address/TokenId are placeholders; integrate with chain primitives in your node.
//! - `LedgerGateway` abstracts balances, transfers and the platform clock.
//!
//! (c) Aethernova

#![forbid(unsafe_code)]
#![allow(clippy::too_many_arguments)]

mod admin;
mod allocation;
mod engine;
mod error;
mod events;
mod ledger;
mod period;
mod pool;
mod purchases;
mod settlement;
mod whitelist;

pub use admin::AdminSet;
pub use allocation::{claimable_for, mul_div, Claimable};
pub use engine::{Launchpad, PoolView};
pub use error::{LedgerError, PoolError};
pub use events::PoolEvent;
pub use ledger::{LedgerGateway, MemoryLedger};
pub use period::{Period, Schedule};
pub use pool::{Pool, PoolParams};
pub use purchases::PurchaseLedger;
pub use settlement::{withdrawal_amounts, Withdrawal, TOLERANCE};
pub use whitelist::Whitelist;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

// ---------- Primitives ----------

/// 20-byte address placeholder; replace with chain primitive.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Address whose trailing bytes hold `v` big-endian; handy for fixtures and vaults.
    pub fn from_low_u64(v: u64) -> Self {
        let mut a = [0u8; 20];
        a[12..].copy_from_slice(&v.to_be_bytes());
        Address(a)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:?}", self)
    }
}

/// Parses `0x`-prefixed (or bare) hex, left-padding short inputs with zeros.
impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        if hex.is_empty() || hex.len() > 40 {
            return Err(format!("invalid address length: {s}"));
        }
        let padded = format!("{:0>40}", hex);
        let mut out = [0u8; 20];
        for (i, chunk) in padded.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
            out[i] = u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex in address: {s}"))?;
        }
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Opaque fungible token handle issued by the token registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TokenId(pub u32);

/// Smallest-unit token amount.
pub type Amount = u64;

/// Pool handle inside a `Launchpad`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}
