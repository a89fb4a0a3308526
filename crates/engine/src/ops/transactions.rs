use chrono::{DateTime, Utc};
use sea_orm::{
    Condition,
    prelude::*,
    sea_query::{Func, SimpleExpr},
};

use crate::{EngineError, ResultEngine, transactions};

mod list;
mod write;

/// Filters for listing the transactions of an account.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC and
/// applied to the effective date (`executed_at`, else `issued_at`).
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If true, includes soft-deleted transactions (default: false).
    pub include_deleted: bool,
    /// If true, includes transactions not active yet (default: false).
    pub include_pending: bool,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidWindow(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

/// `COALESCE(executed_at, issued_at)`.
fn effective_at() -> SimpleExpr {
    Func::coalesce([
        Expr::col((transactions::Entity, transactions::Column::ExecutedAt)).into(),
        Expr::col((transactions::Entity, transactions::Column::IssuedAt)).into(),
    ])
    .into()
}

/// Transactions already issued and executed as of `now`, deleted or not.
fn settled_condition(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(transactions::Column::IssuedAt.lte(now))
        .add(
            Condition::any()
                .add(transactions::Column::ExecutedAt.is_null())
                .add(transactions::Column::ExecutedAt.lte(now)),
        )
}

fn list_condition(filter: &TransactionListFilter, now: DateTime<Utc>) -> Condition {
    let mut condition = Condition::all();
    if let Some(from) = filter.from {
        condition = condition.add(Expr::expr(effective_at()).gte(from));
    }
    if let Some(to) = filter.to {
        condition = condition.add(Expr::expr(effective_at()).lt(to));
    }
    if !filter.include_deleted {
        condition = condition.add(transactions::Column::DeletedAt.is_null());
    }
    if !filter.include_pending {
        condition = condition.add(settled_condition(now));
    }
    condition
}
