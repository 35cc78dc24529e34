use crate::{
    allocation::claimable_for,
    settlement::{execute_all, withdrawal_amounts, TransferPlan, Withdrawal},
    Address, Amount, Claimable, LedgerGateway, Period, Pool, PoolError, PoolEvent, PoolId, PoolParams,
    TokenId,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, info};

// ---------- Launchpad core ----------

pub struct Launchpad<L: LedgerGateway> {
    ledger: Arc<L>,
    next_id: RwLock<u64>,
    pools: RwLock<BTreeMap<PoolId, Arc<PoolCell>>>,
    events_tx: broadcast::Sender<PoolEvent>,
}

/// Per-pool lock + state container.
struct PoolCell {
    exec: Mutex<()>,
    state: RwLock<Pool>,
}

/// Display snapshot of one pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub id: PoolId,
    pub creator: Address,
    pub vault: Address,
    pub supply_token: TokenId,
    pub purchase_token: TokenId,
    pub params: PoolParams,
    pub period: Period,
    pub paused: bool,
    pub ready: bool,
    pub withdrawn: bool,
    pub admins: usize,
    pub whitelisted: usize,
    pub protected_amount: Amount,
    pub participants: usize,
    pub total_purchased: Amount,
    pub total_purchased_protected: Amount,
    pub claims: usize,
}

impl PoolView {
    fn of(p: &Pool, now: u64) -> Self {
        Self {
            id: p.id,
            creator: p.creator,
            vault: p.vault,
            supply_token: p.supply_token,
            purchase_token: p.purchase_token,
            params: p.params,
            period: p.period(now),
            paused: p.paused,
            ready: p.ready,
            withdrawn: p.withdrawn,
            admins: p.admins.len(),
            whitelisted: p.whitelist.len(),
            protected_amount: p.whitelist.protected_amount(),
            participants: p.purchases.participants(),
            total_purchased: p.purchases.total_purchased(),
            total_purchased_protected: p.purchases.total_purchased_protected(),
            claims: p.claimed.len(),
        }
    }
}

impl<L: LedgerGateway> fmt::Debug for Launchpad<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launchpad")
            .field("pools", &self.pools.read().len())
            .finish()
    }
}

impl<L: LedgerGateway> Launchpad<L> {
    pub fn new(ledger: Arc<L>, event_capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(event_capacity);
        Arc::new(Self {
            ledger,
            next_id: RwLock::new(1),
            pools: RwLock::new(BTreeMap::new()),
            events_tx: tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events_tx.subscribe()
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    fn now(&self) -> u64 {
        self.ledger.now_unix()
    }

    fn emit(&self, ev: PoolEvent) {
        let _ = self.events_tx.send(ev);
    }

    // ----- configuration -----

    pub fn create_pool(
        &self,
        creator: Address,
        supply_token: TokenId,
        purchase_token: TokenId,
        params: PoolParams,
    ) -> Result<PoolId, PoolError> {
        let mut g = self.next_id.write();
        let id = PoolId(*g);
        let vault = self.ledger.vault_address(id);
        let pool = Pool::new(id, creator, vault, supply_token, purchase_token, params, self.now())?;
        *g = g.saturating_add(1);

        let cell = Arc::new(PoolCell { exec: Mutex::new(()), state: RwLock::new(pool) });
        self.pools.write().insert(id, cell);
        info!(target: "launchpad", pool = %id, creator = %creator, %vault, ?supply_token, ?purchase_token, "pool created");
        self.emit(PoolEvent::PoolCreated { pool: id, supply_token, purchase_token });
        Ok(id)
    }

    pub fn add_pool_admins(&self, caller: Address, id: PoolId, admins: &[Address]) -> Result<usize, PoolError> {
        let cell = self.pool_cell(id)?;
        let mut p = cell.state.write();
        let added = p.admins.add(&caller, admins)?;
        info!(target: "launchpad", pool = %id, caller = %caller, added, "admins added");
        self.emit(PoolEvent::AdminsAdded { pool: id, admins: admins.to_vec() });
        Ok(added)
    }

    /// Removing every admin is allowed and leaves the pool without an operator.
    pub fn remove_pool_admins(&self, caller: Address, id: PoolId, admins: &[Address]) -> Result<usize, PoolError> {
        let cell = self.pool_cell(id)?;
        let mut p = cell.state.write();
        let removed = p.admins.remove(&caller, admins)?;
        info!(target: "launchpad", pool = %id, caller = %caller, removed, left = p.admins.len(), "admins removed");
        self.emit(PoolEvent::AdminsRemoved { pool: id, admins: admins.to_vec() });
        Ok(removed)
    }

    pub fn pause_pool(&self, caller: Address, id: PoolId) -> Result<(), PoolError> {
        self.set_paused(caller, id, true)
    }

    pub fn unpause_pool(&self, caller: Address, id: PoolId) -> Result<(), PoolError> {
        self.set_paused(caller, id, false)
    }

    fn set_paused(&self, caller: Address, id: PoolId, paused: bool) -> Result<(), PoolError> {
        let cell = self.pool_cell(id)?;
        let mut p = cell.state.write();
        p.admins.require(&caller)?;
        p.paused = paused;
        info!(target: "launchpad", pool = %id, caller = %caller, paused, "pause switched");
        self.emit(PoolEvent::PauseChanged { pool: id, paused });
        Ok(())
    }

    /// Moves supply tokens from the caller into the pool vault.
    pub fn deposit_supply_token(&self, caller: Address, id: PoolId, amount: Amount) -> Result<(), PoolError> {
        let cell = self.pool_cell(id)?;
        let _ex = cell.exec.lock();
        let p = cell.state.write();
        p.admins.require(&caller)?;
        p.require_edit()?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        self.ledger.transfer(p.supply_token, caller, p.vault, amount)?;
        info!(target: "launchpad", pool = %id, caller = %caller, amount, "supply deposited");
        self.emit(PoolEvent::SupplyDeposited { pool: id, from: caller, amount });
        Ok(())
    }

    pub fn update_pool(&self, caller: Address, id: PoolId, params: PoolParams) -> Result<(), PoolError> {
        let cell = self.pool_cell(id)?;
        let mut p = cell.state.write();
        p.admins.require(&caller)?;
        p.require_edit()?;
        params.validate()?;
        p.params = params;
        info!(target: "launchpad", pool = %id, caller = %caller, ?params, "pool updated");
        self.emit(PoolEvent::PoolUpdated { pool: id });
        Ok(())
    }

    /// Sets the protected amount of every address in `addresses` to `amount`.
    /// Returns the new whitelist sum.
    pub fn update_whitelist(
        &self,
        caller: Address,
        id: PoolId,
        addresses: &[Address],
        amount: Amount,
    ) -> Result<Amount, PoolError> {
        let cell = self.pool_cell(id)?;
        let mut p = cell.state.write();
        p.admins.require(&caller)?;
        p.require_edit()?;
        let hard_cap = p.params.hard_cap;
        let total = p.whitelist.update(addresses, amount, hard_cap)?;
        info!(target: "launchpad", pool = %id, caller = %caller, count = addresses.len(), amount, total, "whitelist updated");
        self.emit(PoolEvent::WhitelistUpdated {
            pool: id,
            addresses: addresses.to_vec(),
            protected_amount: amount,
            total_protected: total,
        });
        Ok(total)
    }

    /// Freezes the configuration. The vault must hold exactly `ido_supply`.
    pub fn set_pool_ready(&self, caller: Address, id: PoolId) -> Result<(), PoolError> {
        let cell = self.pool_cell(id)?;
        let _ex = cell.exec.lock();
        let mut p = cell.state.write();
        p.admins.require(&caller)?;
        p.require_edit()?;
        if self.now() >= p.params.ido_start_time {
            return Err(PoolError::AlreadyStarted);
        }
        let actual = match p.params.ido_supply {
            0 => 0,
            _ => self.ledger.balance_of(p.supply_token, p.vault)?,
        };
        if actual != p.params.ido_supply {
            return Err(PoolError::InvalidSupply { expected: p.params.ido_supply, actual });
        }
        let protected = p.whitelist.protected_amount();
        if protected > p.params.hard_cap {
            return Err(PoolError::ProtectedExceedsCap { protected, hard_cap: p.params.hard_cap });
        }
        p.ready = true;
        info!(target: "launchpad", pool = %id, caller = %caller, supply = actual, protected, "pool ready");
        self.emit(PoolEvent::PoolReady { pool: id });
        Ok(())
    }

    // ----- sale -----

    /// Pays `amount` purchase tokens into the vault. Returns the part booked as protected.
    pub fn purchase(&self, buyer: Address, id: PoolId, amount: Amount) -> Result<Amount, PoolError> {
        let cell = self.pool_cell(id)?;
        let _ex = cell.exec.lock();
        let mut p = cell.state.write();
        p.require_ido(self.now())?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let minimum = p.params.minimum_purchase_amount;
        if amount < minimum {
            return Err(PoolError::BelowMinimum { amount, minimum });
        }

        let protected = p.whitelist.get(&buyer);
        let staged = p.purchases.stage(buyer, amount, protected)?;
        self.ledger.transfer(p.purchase_token, buyer, p.vault, amount)?;
        let protected_filled = p.purchases.commit(staged);

        debug!(
            target: "launchpad",
            pool = %id,
            buyer = %buyer,
            amount,
            protected_filled,
            total = p.purchases.total_purchased(),
            total_protected = p.purchases.total_purchased_protected(),
            "purchase booked"
        );
        self.emit(PoolEvent::Purchased { pool: id, buyer, amount, protected_filled });
        Ok(protected_filled)
    }

    // ----- settlement -----

    /// Pays `who` its supply tokens and refund. One claim per address.
    ///
    /// Returns the entitlement as of after the claim. `refund` is the amount
    /// owed; a tolerated shortfall is reported through `TransferLoss`.
    pub fn claim(&self, who: Address, id: PoolId) -> Result<Claimable, PoolError> {
        let cell = self.pool_cell(id)?;
        let _ex = cell.exec.lock();
        let mut p = cell.state.write();
        p.require_claim(self.now())?;
        if p.is_claimed(&who) {
            return Err(PoolError::AlreadyClaimed);
        }
        let mut c = claimable_for(&p, who)?;
        if c.claimable == 0 && c.refund == 0 {
            return Err(PoolError::NothingClaimable);
        }

        let ledger = self.ledger.as_ref();
        let supply = TransferPlan::exact(ledger, p.supply_token, p.vault, who, c.claimable)?;
        let refund = TransferPlan::tolerant(ledger, p.purchase_token, p.vault, who, c.refund)?;
        let losses = execute_all(ledger, &[supply, refund])?;

        p.claimed.insert(who);
        c.claimed = true;
        for ev in losses {
            self.emit(ev);
        }
        debug!(target: "launchpad", pool = %id, beneficiary = %who, supply = c.claimable, refund = refund.actual, "claimed");
        self.emit(PoolEvent::Claimed {
            pool: id,
            beneficiary: who,
            supply_amount: c.claimable,
            refund_amount: refund.actual,
        });
        Ok(c)
    }

    /// Sends proceeds and unsold supply to the purchase token recipient, once.
    pub fn withdraw(&self, caller: Address, id: PoolId) -> Result<Withdrawal, PoolError> {
        let cell = self.pool_cell(id)?;
        let _ex = cell.exec.lock();
        let mut p = cell.state.write();
        p.require_claim(self.now())?;
        let recipient = p.params.purchase_token_recipient;
        if caller != recipient {
            return Err(PoolError::NotRecipient);
        }
        if p.withdrawn {
            return Err(PoolError::AlreadyWithdrawn);
        }
        let w = withdrawal_amounts(&p)?;

        let ledger = self.ledger.as_ref();
        let proceeds = TransferPlan::tolerant(ledger, p.purchase_token, p.vault, recipient, w.purchase_amount)?;
        let unsold = TransferPlan::exact(ledger, p.supply_token, p.vault, recipient, w.supply_amount)?;
        let losses = execute_all(ledger, &[proceeds, unsold])?;

        p.withdrawn = true;
        for ev in losses {
            self.emit(ev);
        }
        let paid = Withdrawal { purchase_amount: proceeds.actual, supply_amount: w.supply_amount };
        info!(
            target: "launchpad",
            pool = %id,
            recipient = %recipient,
            purchase_amount = paid.purchase_amount,
            supply_amount = paid.supply_amount,
            "proceeds withdrawn"
        );
        self.emit(PoolEvent::Withdrawn {
            pool: id,
            recipient,
            purchase_amount: paid.purchase_amount,
            supply_amount: paid.supply_amount,
        });
        Ok(paid)
    }

    // ----- queries -----

    /// Views of the requested pools, or of every pool when `ids` is empty.
    pub fn get_pools_view(&self, ids: &[PoolId]) -> Result<Vec<PoolView>, PoolError> {
        let now = self.now();
        if ids.is_empty() {
            let cells: Vec<Arc<PoolCell>> = self.pools.read().values().cloned().collect();
            return Ok(cells.iter().map(|c| PoolView::of(&c.state.read(), now)).collect());
        }
        ids.iter()
            .map(|id| self.pool_cell(*id).map(|c| PoolView::of(&c.state.read(), now)))
            .collect()
    }

    pub fn get_pool_admins(&self, id: PoolId) -> Result<Vec<Address>, PoolError> {
        Ok(self.pool_cell(id)?.state.read().admins.to_vec())
    }

    pub fn get_claimable_amount(&self, id: PoolId, who: Address) -> Result<Claimable, PoolError> {
        claimable_for(&self.pool_cell(id)?.state.read(), who)
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.pools.read().keys().copied().collect()
    }

    /// Read-only snapshot of pool state.
    pub fn snapshot(&self, id: PoolId) -> Result<Pool, PoolError> {
        Ok(self.pool_cell(id)?.state.read().clone())
    }

    /// Cached protected total against its from-scratch derivation.
    pub fn audit_protected(&self, id: PoolId) -> Result<(Amount, u128), PoolError> {
        let cell = self.pool_cell(id)?;
        let p = cell.state.read();
        Ok((p.purchases.total_purchased_protected(), p.purchases.recompute_protected(&p.whitelist)))
    }

    fn pool_cell(&self, id: PoolId) -> Result<Arc<PoolCell>, PoolError> {
        self.pools
            .read()
            .get(&id)
            .cloned()
            .ok_or(PoolError::PoolNotFound(id))
    }
}

// ---------- Tests ----------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pool::fixtures::addr, LedgerError, MemoryLedger, TOLERANCE};

    const SUPPLY: TokenId = TokenId(10);
    const USD: TokenId = TokenId(20);

    struct Env {
        ledger: Arc<MemoryLedger>,
        lp: Arc<Launchpad<MemoryLedger>>,
        admin: Address,
        recipient: Address,
    }

    fn params(hard_cap: Amount, ido_supply: Amount) -> PoolParams {
        PoolParams {
            ido_start_time: 1_000,
            ido_end_time: 2_000,
            claim_start_time: 3_000,
            hard_cap,
            ido_supply,
            minimum_purchase_amount: 0,
            purchase_token_recipient: addr(0xFE),
        }
    }

    fn env() -> Env {
        let ledger = Arc::new(MemoryLedger::new(100));
        let lp = Launchpad::new(ledger.clone(), 256);
        Env { ledger, lp, admin: addr(0xA0), recipient: addr(0xFE) }
    }

    /// Created, funded and ready pool; clock still before the sale.
    fn ready(e: &Env, hard_cap: Amount, ido_supply: Amount, whitelist: &[(Address, Amount)]) -> PoolId {
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(hard_cap, ido_supply)).unwrap();
        e.ledger.mint(SUPPLY, e.admin, ido_supply);
        e.lp.deposit_supply_token(e.admin, id, ido_supply).unwrap();
        for (who, amount) in whitelist {
            e.lp.update_whitelist(e.admin, id, &[*who], *amount).unwrap();
        }
        e.lp.set_pool_ready(e.admin, id).unwrap();
        id
    }

    fn fund_and_buy(e: &Env, id: PoolId, who: Address, amount: Amount) {
        e.ledger.mint(USD, who, amount);
        e.lp.purchase(who, id, amount).unwrap();
    }

    #[test]
    fn create_rejects_bad_config() {
        let e = env();
        assert_eq!(
            e.lp.create_pool(e.admin, SUPPLY, SUPPLY, params(10, 10)).unwrap_err(),
            PoolError::InvalidFungibleAssetPair
        );
        let mut bad = params(10, 10);
        bad.claim_start_time = bad.ido_end_time - 1;
        assert_eq!(e.lp.create_pool(e.admin, SUPPLY, USD, bad).unwrap_err(), PoolError::InvalidTimes);
        assert_eq!(e.lp.create_pool(e.admin, SUPPLY, USD, params(0, 10)).unwrap_err(), PoolError::InvalidHardCap);
        assert!(e.lp.pool_ids().is_empty());
    }

    #[test]
    fn create_emits_and_assigns_vault() {
        let e = env();
        let mut rx = e.lp.subscribe();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(10, 10)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), PoolEvent::PoolCreated { pool: id, supply_token: SUPPLY, purchase_token: USD });
        let p = e.lp.snapshot(id).unwrap();
        assert_eq!(p.vault, e.ledger.vault_address(id));
        assert_eq!(e.lp.get_pool_admins(id).unwrap(), vec![e.admin]);

        let other = e.lp.create_pool(e.admin, SUPPLY, USD, params(10, 10)).unwrap();
        assert_ne!(e.lp.snapshot(other).unwrap().vault, p.vault);
    }

    #[test]
    fn admin_gating() {
        let e = env();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(1_000, 1_000)).unwrap();
        let stranger = addr(0x55);
        assert_eq!(e.lp.update_whitelist(stranger, id, &[stranger], 1), Err(PoolError::NotAdmin));
        assert_eq!(e.lp.pause_pool(stranger, id), Err(PoolError::NotAdmin));
        assert_eq!(e.lp.add_pool_admins(stranger, id, &[stranger]), Err(PoolError::NotAdmin));
        assert_eq!(e.lp.set_pool_ready(stranger, id), Err(PoolError::NotAdmin));

        assert_eq!(e.lp.add_pool_admins(e.admin, id, &[stranger]).unwrap(), 1);
        assert_eq!(e.lp.update_whitelist(stranger, id, &[addr(1)], 10).unwrap(), 10);

        // last admin may leave; the pool is then unmanageable
        e.lp.remove_pool_admins(stranger, id, &[e.admin, stranger]).unwrap();
        assert!(e.lp.get_pool_admins(id).unwrap().is_empty());
        assert_eq!(e.lp.pause_pool(e.admin, id), Err(PoolError::NotAdmin));
    }

    #[test]
    fn ready_requires_exact_supply_and_future_start() {
        let e = env();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(1_000, 500)).unwrap();
        e.ledger.mint(SUPPLY, e.admin, 1_000);
        e.lp.deposit_supply_token(e.admin, id, 400).unwrap();
        assert_eq!(e.lp.set_pool_ready(e.admin, id), Err(PoolError::InvalidSupply { expected: 500, actual: 400 }));

        e.lp.deposit_supply_token(e.admin, id, 100).unwrap();
        e.ledger.set_now(1_000);
        assert_eq!(e.lp.set_pool_ready(e.admin, id), Err(PoolError::AlreadyStarted));

        e.ledger.set_now(999);
        e.lp.set_pool_ready(e.admin, id).unwrap();
        assert_eq!(e.lp.set_pool_ready(e.admin, id), Err(PoolError::AlreadyReady));
        assert_eq!(e.lp.update_pool(e.admin, id, params(2_000, 500)), Err(PoolError::AlreadyReady));
        assert_eq!(e.lp.deposit_supply_token(e.admin, id, 1), Err(PoolError::AlreadyReady));
        assert_eq!(e.lp.update_whitelist(e.admin, id, &[addr(1)], 1), Err(PoolError::AlreadyReady));
    }

    #[test]
    fn update_pool_revalidates() {
        let e = env();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(1_000, 500)).unwrap();
        let mut p = params(5_000, 800);
        p.ido_start_time = p.ido_end_time;
        assert_eq!(e.lp.update_pool(e.admin, id, p), Err(PoolError::InvalidTimes));
        e.lp.update_pool(e.admin, id, params(5_000, 800)).unwrap();
        assert_eq!(e.lp.snapshot(id).unwrap().params.hard_cap, 5_000);
    }

    #[test]
    fn period_gating() {
        let e = env();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(1_000, 500)).unwrap();
        e.ledger.mint(USD, addr(1), 1_000);

        assert_eq!(e.lp.purchase(addr(1), id, 10), Err(PoolError::NotReady));
        e.ledger.mint(SUPPLY, e.admin, 500);
        e.lp.deposit_supply_token(e.admin, id, 500).unwrap();
        e.lp.set_pool_ready(e.admin, id).unwrap();

        assert_eq!(e.lp.purchase(addr(1), id, 10), Err(PoolError::NotStarted));
        e.ledger.set_now(1_000);
        e.lp.purchase(addr(1), id, 10).unwrap();
        e.ledger.set_now(2_000);
        assert_eq!(e.lp.purchase(addr(1), id, 10), Err(PoolError::AlreadyFinished));
        assert_eq!(e.lp.claim(addr(1), id).unwrap_err(), PoolError::ClaimNotStarted);
        assert_eq!(e.lp.get_pools_view(&[id]).unwrap()[0].period, Period::Closed);
    }

    #[test]
    fn purchase_validation_leaves_no_trace() {
        let e = env();
        let mut p = params(1_000, 500);
        p.minimum_purchase_amount = 50;
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, p).unwrap();
        e.ledger.mint(SUPPLY, e.admin, 500);
        e.lp.deposit_supply_token(e.admin, id, 500).unwrap();
        e.lp.set_pool_ready(e.admin, id).unwrap();
        e.ledger.set_now(1_500);

        assert_eq!(e.lp.purchase(addr(1), id, 0), Err(PoolError::InvalidAmount));
        assert_eq!(e.lp.purchase(addr(1), id, 49), Err(PoolError::BelowMinimum { amount: 49, minimum: 50 }));
        e.ledger.mint(USD, addr(1), 60);
        assert!(matches!(
            e.lp.purchase(addr(1), id, 70),
            Err(PoolError::Ledger(LedgerError::Insufficient { .. }))
        ));
        let snap = e.lp.snapshot(id).unwrap();
        assert_eq!(snap.purchases.total_purchased(), 0);
        assert_eq!(e.ledger.balance(USD, addr(1)), 60);
    }

    #[test]
    fn pause_blocks_everything_but_admin_ops() {
        let e = env();
        let id = ready(&e, 1_000, 500, &[]);
        e.ledger.set_now(1_500);
        e.ledger.mint(USD, addr(1), 100);

        e.lp.pause_pool(e.admin, id).unwrap();
        assert_eq!(e.lp.purchase(addr(1), id, 100), Err(PoolError::Paused));
        e.lp.add_pool_admins(e.admin, id, &[addr(2)]).unwrap();
        assert_eq!(e.lp.get_pools_view(&[id]).unwrap()[0].period, Period::Ido);

        e.lp.unpause_pool(addr(2), id).unwrap();
        e.lp.purchase(addr(1), id, 100).unwrap();
    }

    #[test]
    fn paused_edit_ops_fail_with_paused() {
        let e = env();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(1_000, 500)).unwrap();
        e.lp.pause_pool(e.admin, id).unwrap();
        assert_eq!(e.lp.update_whitelist(e.admin, id, &[addr(1)], 1), Err(PoolError::Paused));
        assert_eq!(e.lp.set_pool_ready(e.admin, id), Err(PoolError::Paused));
        assert_eq!(e.lp.update_pool(e.admin, id, params(2_000, 500)), Err(PoolError::Paused));
    }

    #[test]
    fn whitelist_batch_rejected_whole() {
        let e = env();
        let id = e.lp.create_pool(e.admin, SUPPLY, USD, params(1_000, 500)).unwrap();
        e.lp.update_whitelist(e.admin, id, &[addr(1), addr(2)], 400).unwrap();
        assert_eq!(
            e.lp.update_whitelist(e.admin, id, &[addr(3)], 300),
            Err(PoolError::ProtectedExceedsCap { protected: 1_100, hard_cap: 1_000 })
        );
        // reset-to-value lowers the sum
        assert_eq!(e.lp.update_whitelist(e.admin, id, &[addr(1), addr(3)], 300).unwrap(), 1_000);
        assert_eq!(e.lp.get_pools_view(&[id]).unwrap()[0].whitelisted, 3);
    }

    #[test]
    fn full_lifecycle_undersubscribed() {
        let e = env();
        let id = ready(&e, 1_000_000, 500_000, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 150_000);

        assert_eq!(e.lp.claim(addr(1), id).unwrap_err(), PoolError::ClaimNotStarted);
        e.ledger.set_now(3_000);
        let c = e.lp.claim(addr(1), id).unwrap();
        assert_eq!((c.claimable, c.refund), (75_000, 0));
        assert_eq!(e.ledger.balance(SUPPLY, addr(1)), 75_000);
        assert_eq!(e.lp.claim(addr(1), id).unwrap_err(), PoolError::AlreadyClaimed);
        assert!(e.lp.get_claimable_amount(id, addr(1)).unwrap().claimed);

        assert_eq!(e.lp.withdraw(addr(1), id).unwrap_err(), PoolError::NotRecipient);
        let w = e.lp.withdraw(e.recipient, id).unwrap();
        assert_eq!(w, Withdrawal { purchase_amount: 150_000, supply_amount: 425_000 });
        assert_eq!(e.ledger.balance(USD, e.recipient), 150_000);
        assert_eq!(e.ledger.balance(SUPPLY, e.recipient), 425_000);
        assert_eq!(e.lp.withdraw(e.recipient, id).unwrap_err(), PoolError::AlreadyWithdrawn);

        let vault = e.lp.snapshot(id).unwrap().vault;
        assert_eq!(e.ledger.balance(SUPPLY, vault), 0);
        assert_eq!(e.ledger.balance(USD, vault), 0);
    }

    #[test]
    fn nothing_to_claim_for_non_buyer() {
        let e = env();
        let id = ready(&e, 1_000, 500, &[]);
        e.ledger.set_now(3_000);
        assert_eq!(e.lp.claim(addr(9), id).unwrap_err(), PoolError::NothingClaimable);
    }

    #[test]
    fn oversubscribed_settles_with_refunds() {
        let e = env();
        let id = ready(&e, 1_000, 2_000, &[(addr(1), 400)]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 500);
        fund_and_buy(&e, id, addr(2), 1_200);
        let (cached, derived) = e.lp.audit_protected(id).unwrap();
        assert_eq!((u128::from(cached), derived), (400, 400));

        e.ledger.set_now(3_000);
        let w = e.lp.withdraw(e.recipient, id).unwrap();
        assert_eq!(w, Withdrawal { purchase_amount: 1_000, supply_amount: 0 });

        // unprotected room 600 split over unprotected demand 1_300
        let a = e.lp.claim(addr(1), id).unwrap();
        assert_eq!(a.fill(), 400 + 100 * 600 / 1_300);
        let b = e.lp.claim(addr(2), id).unwrap();
        assert_eq!(b.fill(), 1_200 * 600 / 1_300);
        assert_eq!(e.ledger.balance(USD, addr(1)), a.refund);
        assert_eq!(e.ledger.balance(SUPPLY, addr(2)), b.claimable);
    }

    #[test]
    fn refund_absorbs_dust_up_to_tolerance() {
        let e = env();
        let id = ready(&e, 1_000, 1_000, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 2_000);
        e.ledger.set_now(3_000);

        let vault = e.lp.snapshot(id).unwrap().vault;
        // refund owed is 1_000; vault holds 2_000 before the burn
        e.ledger.burn(USD, vault, 1_000 + TOLERANCE);
        let mut rx = e.lp.subscribe();
        let c = e.lp.claim(addr(1), id).unwrap();
        assert_eq!(c.refund, 1_000);
        assert_eq!(e.ledger.balance(USD, addr(1)), 1_000 - TOLERANCE);
        assert_eq!(
            rx.try_recv().unwrap(),
            PoolEvent::TransferLoss {
                token: USD,
                from: vault,
                to: addr(1),
                expected_amount: 1_000,
                actual_amount: 1_000 - TOLERANCE,
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), PoolEvent::Claimed { refund_amount: 900, .. }));
    }

    #[test]
    fn claim_past_tolerance_moves_nothing() {
        let e = env();
        let id = ready(&e, 1_000, 1_000, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 2_000);
        e.ledger.set_now(3_000);

        let vault = e.lp.snapshot(id).unwrap().vault;
        e.ledger.burn(USD, vault, 1_000 + TOLERANCE + 1);
        let err = e.lp.claim(addr(1), id).unwrap_err();
        assert_eq!(err, PoolError::ToleranceExceeded { shortfall: TOLERANCE + 1 });
        // supply leg was planned but not executed
        assert_eq!(e.ledger.balance(SUPPLY, addr(1)), 0);
        assert!(!e.lp.get_claimable_amount(id, addr(1)).unwrap().claimed);
    }

    #[test]
    fn failed_refund_undoes_supply_leg() {
        let e = env();
        let id = ready(&e, 1_000, 1_000, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 2_000);
        e.ledger.set_now(3_000);

        // refund of 1_000 cannot be credited
        e.ledger.mint(USD, addr(1), Amount::MAX - 500);
        assert!(matches!(e.lp.claim(addr(1), id), Err(PoolError::Ledger(LedgerError::Other(_)))));
        let vault = e.lp.snapshot(id).unwrap().vault;
        assert_eq!(e.ledger.balance(SUPPLY, addr(1)), 0);
        assert_eq!(e.ledger.balance(SUPPLY, vault), 1_000);
        assert!(!e.lp.get_claimable_amount(id, addr(1)).unwrap().claimed);

        e.ledger.burn(USD, addr(1), Amount::MAX);
        let c = e.lp.claim(addr(1), id).unwrap();
        assert_eq!(c.claimable, 1_000);
        assert_eq!(e.ledger.balance(SUPPLY, addr(1)), 1_000);
        assert_eq!(e.lp.claim(addr(1), id).unwrap_err(), PoolError::AlreadyClaimed);
        assert_eq!(e.ledger.balance(SUPPLY, addr(1)), 1_000);
    }

    #[test]
    fn failed_unsold_leg_undoes_proceeds() {
        let e = env();
        let id = ready(&e, 1_000, 500, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 400);
        e.ledger.set_now(3_000);

        e.ledger.mint(SUPPLY, e.recipient, Amount::MAX);
        assert!(e.lp.withdraw(e.recipient, id).is_err());
        let vault = e.lp.snapshot(id).unwrap().vault;
        assert_eq!(e.ledger.balance(USD, vault), 400);
        assert_eq!(e.ledger.balance(USD, e.recipient), 0);
        assert!(!e.lp.snapshot(id).unwrap().withdrawn);

        e.ledger.burn(SUPPLY, e.recipient, Amount::MAX);
        let w = e.lp.withdraw(e.recipient, id).unwrap();
        assert_eq!(w, Withdrawal { purchase_amount: 400, supply_amount: 300 });
    }

    #[test]
    fn pause_blocks_settlement_until_unpaused() {
        let e = env();
        let id = ready(&e, 1_000, 500, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 200);
        e.ledger.set_now(3_000);

        e.lp.pause_pool(e.admin, id).unwrap();
        assert_eq!(e.lp.claim(addr(1), id).unwrap_err(), PoolError::Paused);
        assert_eq!(e.lp.withdraw(e.recipient, id).unwrap_err(), PoolError::Paused);
        assert_eq!(e.ledger.balance(SUPPLY, addr(1)), 0);

        e.lp.unpause_pool(e.admin, id).unwrap();
        assert_eq!(e.lp.claim(addr(1), id).unwrap().claimable, 100);
        assert_eq!(e.lp.withdraw(e.recipient, id).unwrap().purchase_amount, 200);
    }

    #[test]
    fn claim_returns_settled_entitlement() {
        let e = env();
        let id = ready(&e, 1_000, 500, &[]);
        e.ledger.set_now(1_000);
        fund_and_buy(&e, id, addr(1), 200);
        e.ledger.set_now(3_000);

        let c = e.lp.claim(addr(1), id).unwrap();
        assert!(c.claimed);
        assert_eq!(c, e.lp.get_claimable_amount(id, addr(1)).unwrap());
    }

    #[test]
    fn zero_supply_pool_becomes_ready_without_deposit() {
        let e = env();
        let id = e.lp.create_pool(e.admin, TokenId(99), USD, params(1_000, 0)).unwrap();
        e.lp.set_pool_ready(e.admin, id).unwrap();
        assert!(e.lp.snapshot(id).unwrap().ready);
    }

    #[test]
    fn unknown_pool() {
        let e = env();
        assert_eq!(e.lp.purchase(addr(1), PoolId(77), 1), Err(PoolError::PoolNotFound(PoolId(77))));
        assert!(e.lp.get_pools_view(&[PoolId(77)]).is_err());
        assert!(e.lp.get_pools_view(&[]).unwrap().is_empty());
    }
}
