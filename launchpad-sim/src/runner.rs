use std::sync::Arc;

use aethernova_launchpad::{
    Address, Amount, Claimable, Launchpad, LedgerGateway, MemoryLedger, PoolError, PoolEvent, PoolId, PoolView,
    Withdrawal,
};
use anyhow::Context;
use serde::Serialize;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{info, warn};

use crate::scenario::Scenario;

/// Everything a run produced; printed as JSON.
#[derive(Debug, Serialize)]
pub struct Report {
    pub scenario: String,
    pub pool: PoolView,
    pub claims: Vec<Claimable>,
    pub withdrawal: Option<Withdrawal>,
    pub rejected: Vec<Rejection>,
    pub vault: VaultBalances,
    pub totals: Totals,
    pub events: Vec<PoolEvent>,
}

/// An operation the engine refused; the run carries on.
#[derive(Debug, Serialize)]
pub struct Rejection {
    pub op: &'static str,
    pub caller: Address,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct VaultBalances {
    pub address: Address,
    pub supply: Amount,
    pub purchase: Amount,
}

#[derive(Debug, Default, Serialize)]
pub struct Totals {
    pub supply_claimed: Amount,
    pub refunded: Amount,
    pub transfer_losses: usize,
    pub dust_lost: Amount,
}

/// Plays the whole pool lifecycle on a fresh in-memory ledger.
pub fn run(s: &Scenario) -> anyhow::Result<Report> {
    let pool = &s.pool;
    let ledger = Arc::new(MemoryLedger::new(pool.setup_time));
    let lp = Launchpad::new(ledger.clone(), s.event_capacity);
    let mut rx = lp.subscribe();
    let creator = pool.creator;

    let id = lp
        .create_pool(creator, pool.supply_token(), pool.purchase_token(), pool.params())
        .context("create_pool")?;
    ledger.mint(pool.supply_token(), creator, pool.ido_supply);
    if pool.ido_supply > 0 {
        lp.deposit_supply_token(creator, id, pool.ido_supply).context("deposit_supply_token")?;
    }
    for batch in &s.whitelist {
        lp.update_whitelist(creator, id, &batch.addresses, batch.amount)
            .with_context(|| format!("update_whitelist {} addresses", batch.addresses.len()))?;
    }
    lp.set_pool_ready(creator, id).context("set_pool_ready")?;
    info!(scenario = %s.name, pool = %id, "pool configured");

    let mut rejected = Vec::new();
    let mut orders: Vec<_> = s.purchases.iter().collect();
    orders.sort_by_key(|o| o.time(pool));
    for order in orders {
        ledger.set_now(order.time(pool));
        ledger.mint(pool.purchase_token(), order.buyer, order.amount);
        if let Err(e) = lp.purchase(order.buyer, id, order.amount) {
            note(&mut rejected, "purchase", order.buyer, e);
        }
    }

    ledger.set_now(pool.claim_start_time);
    let recipient = pool.purchase_token_recipient;
    let mut withdrawal = None;
    if s.settlement.withdraw_first {
        withdrawal = withdraw(&lp, id, recipient, &mut rejected);
    }

    let mut buyers: Vec<Address> = lp.snapshot(id)?.purchases.buyers().copied().collect();
    buyers.sort();
    let mut claims = Vec::with_capacity(buyers.len());
    let mut totals = Totals::default();
    for who in buyers {
        match lp.claim(who, id) {
            Ok(c) => claims.push(c),
            Err(e) => {
                note(&mut rejected, "claim", who, e);
                claims.push(lp.get_claimable_amount(id, who)?);
            }
        }
    }

    if !s.settlement.withdraw_first {
        withdrawal = withdraw(&lp, id, recipient, &mut rejected);
    }

    let events = drain(&mut rx);
    for ev in &events {
        match ev {
            PoolEvent::Claimed { supply_amount, refund_amount, .. } => {
                totals.supply_claimed += supply_amount;
                totals.refunded += refund_amount;
            }
            PoolEvent::TransferLoss { expected_amount, actual_amount, .. } => {
                totals.transfer_losses += 1;
                totals.dust_lost += expected_amount - actual_amount;
            }
            _ => {}
        }
    }

    let view = lp
        .get_pools_view(&[id])?
        .into_iter()
        .next()
        .context("pool view missing")?;
    let vault = ledger.vault_address(id);
    let vault = VaultBalances {
        address: vault,
        supply: ledger.balance(pool.supply_token(), vault),
        purchase: ledger.balance(pool.purchase_token(), vault),
    };
    info!(
        scenario = %s.name,
        claims = claims.len(),
        rejected = rejected.len(),
        losses = totals.transfer_losses,
        "run complete"
    );

    Ok(Report { scenario: s.name.clone(), pool: view, claims, withdrawal, rejected, vault, totals, events })
}

fn withdraw(
    lp: &Launchpad<MemoryLedger>,
    id: PoolId,
    recipient: Address,
    rejected: &mut Vec<Rejection>,
) -> Option<Withdrawal> {
    lp.withdraw(recipient, id)
        .map_err(|e| note(rejected, "withdraw", recipient, e))
        .ok()
}

fn note(rejected: &mut Vec<Rejection>, op: &'static str, caller: Address, e: PoolError) {
    if e.is_invariant_breach() {
        warn!(op, caller = %caller, error = %e, "invariant breach");
    } else {
        warn!(op, caller = %caller, error = %e, "operation rejected");
    }
    rejected.push(Rejection { op, caller, error: e.to_string() });
}

fn drain(rx: &mut Receiver<PoolEvent>) -> Vec<PoolEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => out.push(ev),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "event channel lagged; raise event_capacity"),
            Err(_) => break,
        }
    }
    out
}
