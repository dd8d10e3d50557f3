use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    foundation::{
        clock::SharedClock,
        error::{StudioError, StudioResult},
    },
    storage::kv::{SharedStore, get_json},
};

/// Store slot holding the balance as a decimal integer.
pub const BALANCE_KEY: &str = "mockforge.credits";
/// Store slot holding the recent transaction list.
pub const TRANSACTIONS_KEY: &str = "mockforge.credit_transactions";
/// Transactions kept in the history slot.
pub const MAX_TRANSACTIONS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// Direction of a balance change.
pub enum TransactionKind {
    Spend,
    Refund,
    Grant,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// One recorded balance change.
pub struct CreditTransaction {
    pub id: String,
    pub kind: TransactionKind,
    /// Signed change applied to the balance.
    pub amount: i64,
    pub reason: String,
    pub at_ms: u64,
}

/// Durable credit balance with spend-then-settle semantics.
#[derive(Debug)]
pub struct CreditLedger {
    store: SharedStore,
    clock: SharedClock,
    starting_balance: i64,
}

impl CreditLedger {
    /// Ledger over `store`; a store without a balance slot starts at `starting_balance`.
    pub fn new(store: SharedStore, clock: SharedClock, starting_balance: i64) -> Self {
        Self {
            store,
            clock,
            starting_balance,
        }
    }

    pub fn balance(&self) -> StudioResult<i64> {
        match self.store.get_string(BALANCE_KEY)? {
            Some(raw) => parse_balance(&raw),
            None => Ok(self.starting_balance),
        }
    }

    /// Most recent transactions, oldest first.
    pub fn transactions(&self) -> StudioResult<Vec<CreditTransaction>> {
        Ok(get_json(self.store.as_ref(), TRANSACTIONS_KEY)?.unwrap_or_default())
    }

    /// Add purchased or rewarded credits. Returns the new balance.
    pub fn grant(&self, amount: i64, reason: &str) -> StudioResult<i64> {
        if amount <= 0 {
            return Err(StudioError::validation(format!(
                "grant amount must be positive, got {amount}"
            )));
        }
        let balance = self.adjust(amount, false)?;
        self.log(TransactionKind::Grant, amount, reason);
        Ok(balance)
    }

    /// Debit one credit ahead of an AI call.
    ///
    /// The returned [`CreditCharge`] must be settled with [`CreditCharge::commit`] once the call
    /// succeeds; any other exit path refunds it.
    pub fn spend(self: &Arc<Self>, reason: &str) -> StudioResult<CreditCharge> {
        let balance = self.adjust(-1, true)?;
        self.log(TransactionKind::Spend, -1, reason);
        debug!(balance, reason, "credit spent");
        Ok(CreditCharge {
            ledger: Arc::clone(self),
            reason: reason.to_string(),
            settled: false,
        })
    }

    fn adjust(&self, delta: i64, require_funds: bool) -> StudioResult<i64> {
        let starting = self.starting_balance;
        let mut next_balance = starting;
        self.store.read_modify_write(BALANCE_KEY, &mut |current| {
            let balance = match current {
                Some(raw) => parse_balance(&raw)?,
                None => starting,
            };
            let next = balance + delta;
            if require_funds && next < 0 {
                return Err(StudioError::InsufficientCredits { balance });
            }
            next_balance = next;
            Ok(Some(next.to_string()))
        })?;
        Ok(next_balance)
    }

    fn log(&self, kind: TransactionKind, amount: i64, reason: &str) {
        let entry = CreditTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            amount,
            reason: reason.to_string(),
            at_ms: self.clock.now_ms(),
        };
        let res = self.store.read_modify_write(TRANSACTIONS_KEY, &mut |current| {
            let mut list: Vec<CreditTransaction> = current
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default();
            list.push(entry.clone());
            let overflow = list.len().saturating_sub(MAX_TRANSACTIONS);
            list.drain(..overflow);
            Ok(Some(serde_json::to_string(&list)?))
        });
        // history is best-effort
        if let Err(err) = res {
            warn!(error = %err, "failed to record credit transaction");
        }
    }
}

fn parse_balance(raw: &str) -> StudioResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| StudioError::storage(format!("corrupt credit balance '{raw}'")))
}

/// One debited credit awaiting the outcome of its AI call.
///
/// Settling consumes the token, so a charge can be refunded at most once. Dropping it unsettled
/// (error paths, cancelled futures) refunds.
#[derive(Debug)]
#[must_use = "an unsettled charge is refunded when dropped"]
pub struct CreditCharge {
    ledger: Arc<CreditLedger>,
    reason: String,
    settled: bool,
}

impl CreditCharge {
    /// Keep the debit.
    pub fn commit(mut self) {
        self.settled = true;
    }

    /// Return the credit. Returns the new balance.
    pub fn refund(mut self) -> StudioResult<i64> {
        self.settled = true;
        self.ledger.refund_one(&self.reason)
    }
}

impl Drop for CreditCharge {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.ledger.refund_one(&self.reason) {
            warn!(error = %err, reason = %self.reason, "refund on drop failed");
        }
    }
}

impl CreditLedger {
    fn refund_one(&self, reason: &str) -> StudioResult<i64> {
        let balance = self.adjust(1, false)?;
        self.log(TransactionKind::Refund, 1, reason);
        warn!(balance, reason, "credit refunded");
        Ok(balance)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/credits/ledger.rs"]
mod tests;
