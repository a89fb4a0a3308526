//! Daily balance series.
//!
//! A series is a dense, gap-filled grid of calendar days (UTC), oldest
//! first. Day `i` carries the balance at the end of that day:
//!
//! ```text
//! series[0] = baseline + delta(day0)
//! series[i] = series[i - 1] + delta(day_i)
//! ```
//!
//! `baseline` is the balance from every active transaction whose effective
//! date falls strictly before the window, `delta(d)` the net contribution of
//! the transactions effective on `d`. Only transactions active as of `now`
//! are considered, so the last entry always equals the current balance.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AccountKind, EngineError, ResultEngine, Transaction,
    balance::{checked_add, set_contribution},
};

/// Default window for single-account views.
pub const ACCOUNT_WINDOW_DAYS: u32 = 30;
/// Default window for aggregate views.
pub const AGGREGATE_WINDOW_DAYS: u32 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    pub balance: i64,
}

/// First and last day of a window of `days` days ending on `end`.
pub fn window(end: NaiveDate, days: u32) -> ResultEngine<(NaiveDate, NaiveDate)> {
    if days == 0 {
        return Err(EngineError::InvalidWindow(
            "window must span at least one day".to_string(),
        ));
    }
    let start = end
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(|| EngineError::InvalidWindow(format!("window of {days} days is too large")))?;
    Ok((start, end))
}

/// Running sum of `deltas` over `days` consecutive days starting at `start`.
///
/// Days missing from `deltas` carry the previous balance forward.
pub fn project(
    baseline: i64,
    deltas: &BTreeMap<NaiveDate, i64>,
    start: NaiveDate,
    days: u32,
) -> ResultEngine<Vec<DailyBalance>> {
    let mut running = baseline;
    start
        .iter_days()
        .take(days as usize)
        .map(|date| {
            running = checked_add(running, deltas.get(&date).copied().unwrap_or_default())?;
            Ok::<_, EngineError>(DailyBalance {
                date,
                balance: running,
            })
        })
        .collect()
}

/// Splits transactions into the baseline before `start` and per-day deltas
/// from `start` on.
pub fn bucket<'a, I>(
    transactions: I,
    ids: &[i64],
    start: NaiveDate,
    now: DateTime<Utc>,
) -> ResultEngine<(i64, BTreeMap<NaiveDate, i64>)>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut baseline = 0;
    let mut deltas: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for tx in transactions.into_iter().filter(|tx| tx.is_active(now)) {
        let amount = set_contribution(tx, ids);
        let date = tx.effective_date();
        if date < start {
            baseline = checked_add(baseline, amount)?;
        } else {
            let delta = deltas.entry(date).or_default();
            *delta = checked_add(*delta, amount)?;
        }
    }
    Ok((baseline, deltas))
}

/// Daily series for the union of `ids`, `days` entries ending today.
pub fn series<'a, I>(
    transactions: I,
    ids: &[i64],
    now: DateTime<Utc>,
    days: u32,
) -> ResultEngine<Vec<DailyBalance>>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let (start, _end) = window(now.date_naive(), days)?;
    let (baseline, deltas) = bucket(transactions, ids, start, now)?;
    project(baseline, &deltas, start, days)
}

/// Display conventions applied by callers on top of a ledger series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Raw signed ledger balance.
    #[default]
    Ledger,
    /// Debt kinds negated: a positive value is money owed.
    Owed,
    /// Like `Owed`, with credit card debt negated again to read as credit
    /// still available.
    Available,
}

impl SignConvention {
    pub fn factor(self, kind: AccountKind) -> i64 {
        match (self, kind) {
            (Self::Ledger, _) => 1,
            (Self::Available, AccountKind::DebtCredit) => 1,
            (Self::Owed | Self::Available, kind) if kind.is_debt() => -1,
            (Self::Owed | Self::Available, _) => 1,
        }
    }

    /// Fails on a balance with no positive counterpart (`i64::MIN`).
    pub fn apply(self, kind: AccountKind, series: &mut [DailyBalance]) -> ResultEngine<()> {
        if self.factor(kind) == 1 {
            return Ok(());
        }
        for day in series {
            day.balance = day
                .balance
                .checked_neg()
                .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
        }
        Ok(())
    }
}
