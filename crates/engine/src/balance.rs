//! Balance computation over a set of transfers.
//!
//! Everything here is pure: the ops layer loads the relevant transactions and
//! hands them over. The rule for a single account is
//!
//! - `+target_amount` when the account is the target
//! - `-source_amount` when the account is the source
//!
//! summed over the transactions active as of the requested instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountKind, EngineError, ResultEngine, Transaction};

/// Adds two amounts, failing instead of wrapping.
pub fn checked_add(lhs: i64, rhs: i64) -> ResultEngine<i64> {
    lhs.checked_add(rhs)
        .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
}

/// Signed balance of `account_id` as of `as_of`.
///
/// An account without active transactions has balance 0.
pub fn balance<'a, I>(transactions: I, account_id: i64, as_of: DateTime<Utc>) -> ResultEngine<i64>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|tx| tx.is_active(as_of))
        .try_fold(0, |acc, tx| checked_add(acc, tx.signed_amount_for(account_id)))
}

/// Net contribution of `tx` to the union of `ids`.
///
/// A transfer between two members of the set contributes
/// `target_amount - source_amount`, i.e. 0 for same-currency transfers.
pub fn set_contribution(tx: &Transaction, ids: &[i64]) -> i64 {
    let mut amount = 0;
    if ids.contains(&tx.target_id) {
        amount += tx.target_amount;
    }
    if ids.contains(&tx.source_id) {
        amount -= tx.source_amount;
    }
    amount
}

/// Combined balance of every account in `ids` as of `as_of`.
pub fn set_balance<'a, I>(transactions: I, ids: &[i64], as_of: DateTime<Utc>) -> ResultEngine<i64>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|tx| tx.is_active(as_of))
        .try_fold(0, |acc, tx| checked_add(acc, set_contribution(tx, ids)))
}

/// Balance inherited from before the ledger started tracking an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryBalance {
    /// Signed from the parent's point of view.
    pub balance: i64,
    /// Latest effective date among the history transfers, `None` when the
    /// history account is still empty.
    pub at: Option<DateTime<Utc>>,
}

/// Aggregates the transfers between `parent_id` and its history account.
pub fn history<'a, I>(
    transactions: I,
    parent_id: i64,
    history_id: i64,
    as_of: DateTime<Utc>,
) -> ResultEngine<HistoryBalance>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|tx| tx.is_active(as_of) && tx.counterparty(parent_id) == Some(history_id))
        .try_fold(HistoryBalance { balance: 0, at: None }, |acc, tx| {
            Ok::<_, EngineError>(HistoryBalance {
                balance: checked_add(acc.balance, tx.signed_amount_for(parent_id))?,
                at: acc.at.max(Some(tx.effective_at())),
            })
        })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildBalance {
    pub account_id: i64,
    pub kind: AccountKind,
    pub balance: i64,
}

/// Balance of an account rolled up with its non-deleted children.
///
/// History transfers are not part of `balance`; they are reported
/// separately in `history`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedBalance {
    pub account_id: i64,
    pub kind: AccountKind,
    /// Own balance, children excluded.
    pub balance: i64,
    pub children: Vec<ChildBalance>,
    pub history: Option<HistoryBalance>,
    pub capital: i64,
}

impl DetailedBalance {
    /// `balance + Σ children`.
    pub fn rolled_up(&self) -> ResultEngine<i64> {
        self.children
            .iter()
            .try_fold(self.balance, |acc, child| checked_add(acc, child.balance))
    }

    /// Rolled-up balance plus the stated principal for debt kinds.
    pub fn total(&self) -> ResultEngine<i64> {
        let rolled_up = self.rolled_up()?;
        if self.kind.is_debt() {
            checked_add(rolled_up, self.capital)
        } else {
            Ok(rolled_up)
        }
    }
}
