use crate::{Address, Amount, PoolId, TokenId};
use serde::{Deserialize, Serialize};

/// Append-only records for external indexing; not part of queryable state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolEvent {
    PoolCreated { pool: PoolId, supply_token: TokenId, purchase_token: TokenId },
    /// A settlement transfer paid less than owed because of rounding dust.
    TransferLoss { token: TokenId, from: Address, to: Address, expected_amount: Amount, actual_amount: Amount },
    AdminsAdded { pool: PoolId, admins: Vec<Address> },
    AdminsRemoved { pool: PoolId, admins: Vec<Address> },
    PauseChanged { pool: PoolId, paused: bool },
    SupplyDeposited { pool: PoolId, from: Address, amount: Amount },
    PoolUpdated { pool: PoolId },
    WhitelistUpdated { pool: PoolId, addresses: Vec<Address>, protected_amount: Amount, total_protected: Amount },
    PoolReady { pool: PoolId },
    Purchased { pool: PoolId, buyer: Address, amount: Amount, protected_filled: Amount },
    Claimed { pool: PoolId, beneficiary: Address, supply_amount: Amount, refund_amount: Amount },
    Withdrawn { pool: PoolId, recipient: Address, purchase_amount: Amount, supply_amount: Amount },
}
