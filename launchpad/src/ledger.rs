use crate::{Address, Amount, LedgerError, PoolId, TokenId};
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU64, Ordering},
};

/// Ledger and clock the pools settle against.
/// All monetary side-effects go through this trait.
pub trait LedgerGateway: Send + Sync + 'static {
    /// Current UNIX time (seconds).
    fn now_unix(&self) -> u64;

    /// Account holding a pool's supply and purchase tokens.
    fn vault_address(&self, pool: PoolId) -> Address {
        let mut a = [0u8; 20];
        a[..4].copy_from_slice(b"vlt:");
        a[12..].copy_from_slice(&pool.0.to_be_bytes());
        Address(a)
    }

    fn balance_of(&self, token: TokenId, account: Address) -> Result<Amount, LedgerError>;

    /// Move `amount` of `token`; fails without effect on insufficient balance.
    fn transfer(
        &self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

/// Process-local ledger with a settable clock.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    now: AtomicU64,
    tokens: RwLock<HashSet<TokenId>>,
    // balances[(token, account)]
    balances: RwLock<HashMap<(TokenId, Address), Amount>>,
}

impl MemoryLedger {
    pub fn new(now: u64) -> Self {
        let l = Self::default();
        l.set_now(now);
        l
    }

    pub fn set_now(&self, t: u64) {
        self.now.store(t, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Registers `token` if needed and credits `to`.
    pub fn mint(&self, token: TokenId, to: Address, amount: Amount) {
        self.tokens.write().insert(token);
        let mut m = self.balances.write();
        let b = m.entry((token, to)).or_default();
        *b = b.saturating_add(amount);
    }

    /// Debits up to `amount` from `from`, returning what was removed.
    pub fn burn(&self, token: TokenId, from: Address, amount: Amount) -> Amount {
        let mut m = self.balances.write();
        let b = m.entry((token, from)).or_default();
        let taken = amount.min(*b);
        *b -= taken;
        taken
    }

    /// Balance lookup that treats unknown tokens as empty.
    pub fn balance(&self, token: TokenId, who: Address) -> Amount {
        *self.balances.read().get(&(token, who)).unwrap_or(&0)
    }
}

impl LedgerGateway for MemoryLedger {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn balance_of(&self, token: TokenId, account: Address) -> Result<Amount, LedgerError> {
        if !self.tokens.read().contains(&token) {
            return Err(LedgerError::UnsupportedToken);
        }
        Ok(self.balance(token, account))
    }

    fn transfer(
        &self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if !self.tokens.read().contains(&token) {
            return Err(LedgerError::UnsupportedToken);
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        let mut m = self.balances.write();
        let available = *m.get(&(token, from)).unwrap_or(&0);
        if available < amount {
            return Err(LedgerError::Insufficient { available, requested: amount });
        }
        let credited = m
            .get(&(token, to))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Other("balance overflow".into()))?;
        m.insert((token, from), available - amount);
        m.insert((token, to), credited);
        Ok(())
    }
}
