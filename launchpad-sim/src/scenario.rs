//! Scenario loader for the launchpad simulator.
//!
//! Layers (highest precedence last):
//!   1) Built-in defaults
//!   2) Scenario file (TOML, YAML or JSON, picked by extension)
//!   3) Environment variables, prefix `LAUNCHPAD__`, nested by `__`
//!
//! Examples:
//!   LAUNCHPAD__POOL__HARD_CAP=2000000
//!   LAUNCHPAD__SETTLEMENT__WITHDRAW_FIRST=true

use std::path::Path;

use aethernova_launchpad::{Address, Amount, PoolParams, TokenId};
use config as cfg;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A complete pool run: configuration, whitelist, purchase tape and settlement order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    /// Capacity of the engine's event channel; older events are dropped past it.
    pub event_capacity: usize,
    pub pool: PoolSection,
    pub whitelist: Vec<WhitelistBatch>,
    pub purchases: Vec<PurchaseOrder>,
    pub settlement: Settlement,
}

/// Pool parameters plus the clock reading used while configuring.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub creator: Address,
    pub supply_token: u32,
    pub purchase_token: u32,
    /// Ledger time while the pool is created, funded and marked ready.
    pub setup_time: u64,
    pub ido_start_time: u64,
    pub ido_end_time: u64,
    pub claim_start_time: u64,
    pub hard_cap: Amount,
    pub ido_supply: Amount,
    pub minimum_purchase_amount: Amount,
    pub purchase_token_recipient: Address,
}

/// One `update_whitelist` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhitelistBatch {
    pub addresses: Vec<Address>,
    pub amount: Amount,
}

/// One purchase; `at` defaults to the sale start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub buyer: Address,
    pub amount: Amount,
    #[serde(default)]
    pub at: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settlement {
    /// Withdraw proceeds before any participant claims.
    pub withdraw_first: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "scenario".into(),
            event_capacity: 4096,
            pool: PoolSection::default(),
            whitelist: vec![],
            purchases: vec![],
            settlement: Settlement::default(),
        }
    }
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            creator: Address::from_low_u64(0xAD),
            supply_token: 1,
            purchase_token: 2,
            setup_time: 0,
            ido_start_time: 1_000,
            ido_end_time: 2_000,
            claim_start_time: 3_000,
            hard_cap: 1_000_000,
            ido_supply: 1_000_000,
            minimum_purchase_amount: 0,
            purchase_token_recipient: Address::from_low_u64(0xFE),
        }
    }
}

impl PoolSection {
    pub fn supply_token(&self) -> TokenId {
        TokenId(self.supply_token)
    }

    pub fn purchase_token(&self) -> TokenId {
        TokenId(self.purchase_token)
    }

    pub fn params(&self) -> PoolParams {
        PoolParams {
            ido_start_time: self.ido_start_time,
            ido_end_time: self.ido_end_time,
            claim_start_time: self.claim_start_time,
            hard_cap: self.hard_cap,
            ido_supply: self.ido_supply,
            minimum_purchase_amount: self.minimum_purchase_amount,
            purchase_token_recipient: self.purchase_token_recipient,
        }
    }
}

impl PurchaseOrder {
    pub fn time(&self, pool: &PoolSection) -> u64 {
        self.at.unwrap_or(pool.ido_start_time)
    }
}

/// Errors during scenario loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] cfg::ConfigError),
    #[error("path not found `{0}`")]
    PathNotFound(String),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// Load a scenario: defaults → file → environment.
pub fn load(path: &Path) -> Result<Scenario, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::PathNotFound(path.display().to_string()));
    }
    finish(defaults()?.add_source(cfg::File::from(path)))
}

/// Same layering with the file contents given inline.
pub fn load_str(contents: &str, format: cfg::FileFormat) -> Result<Scenario, ConfigError> {
    finish(defaults()?.add_source(cfg::File::from_str(contents, format)))
}

fn defaults() -> Result<cfg::ConfigBuilder<cfg::builder::DefaultState>, ConfigError> {
    let d = Scenario::default();
    Ok(cfg::Config::builder()
        .set_default("name", d.name)?
        .set_default("event_capacity", d.event_capacity as u64)?
        .set_default("settlement.withdraw_first", d.settlement.withdraw_first)?)
}

fn finish(builder: cfg::ConfigBuilder<cfg::builder::DefaultState>) -> Result<Scenario, ConfigError> {
    let built = builder
        .add_source(cfg::Environment::with_prefix("LAUNCHPAD").separator("__").try_parsing(true))
        .build()?;
    let scenario: Scenario = built.try_deserialize()?;
    validate(&scenario)?;
    Ok(scenario)
}

/// Static checks only; anything the engine itself rejects is reported by the run.
fn validate(s: &Scenario) -> Result<(), ConfigError> {
    if s.event_capacity == 0 {
        return Err(ConfigError::Invalid("event_capacity must be > 0".into()));
    }
    let pool = &s.pool;
    if pool.setup_time >= pool.ido_start_time {
        return Err(ConfigError::Invalid("pool.setup_time must precede ido_start_time".into()));
    }
    for (i, order) in s.purchases.iter().enumerate() {
        let at = order.time(pool);
        if at < pool.ido_start_time || at >= pool.ido_end_time {
            return Err(ConfigError::Invalid(format!("purchases[{i}].at {at} is outside the sale window")));
        }
    }
    for (i, batch) in s.whitelist.iter().enumerate() {
        if batch.addresses.is_empty() {
            return Err(ConfigError::Invalid(format!("whitelist[{i}] has no addresses")));
        }
    }
    Ok(())
}
