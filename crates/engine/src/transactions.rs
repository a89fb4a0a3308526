//! Transfer records between two accounts.
//!
//! A `Transaction` moves `source_amount` out of `source_id` and
//! `target_amount` into `target_id`. Both amounts are positive; they differ
//! only when the two accounts use different currencies.
//!
//! ## Activity
//!
//! A transaction affects balances as of an instant `t` when it is not
//! deleted, `issued_at <= t` and `executed_at` is either absent or
//! `<= t`. A missing `executed_at` means the transfer settles as soon as it
//! is issued. A transaction with a future `executed_at` is *pending*.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{Condition, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub source_amount: i64,
    pub target_amount: i64,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether the transaction counts towards balances as of `as_of`.
    pub fn is_active(&self, as_of: DateTime<Utc>) -> bool {
        self.deleted_at.is_none()
            && self.issued_at <= as_of
            && self.executed_at.is_none_or(|executed_at| executed_at <= as_of)
    }

    /// Not deleted but not active yet.
    pub fn is_pending(&self, as_of: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && !self.is_active(as_of)
    }

    /// `executed_at` if present, else `issued_at`.
    pub fn effective_at(&self) -> DateTime<Utc> {
        self.executed_at.unwrap_or(self.issued_at)
    }

    /// Calendar day (UTC) used to bucket the transaction in a daily series.
    pub fn effective_date(&self) -> NaiveDate {
        self.effective_at().date_naive()
    }

    pub fn touches(&self, account_id: i64) -> bool {
        self.source_id == account_id || self.target_id == account_id
    }

    /// The other endpoint, if `account_id` is one of the two.
    pub fn counterparty(&self, account_id: i64) -> Option<i64> {
        if self.source_id == account_id {
            Some(self.target_id)
        } else if self.target_id == account_id {
            Some(self.source_id)
        } else {
            None
        }
    }

    /// Signed contribution to `account_id`: `+target_amount` on the receiving
    /// side, `-source_amount` on the sending side, 0 otherwise.
    pub fn signed_amount_for(&self, account_id: i64) -> i64 {
        if self.target_id == account_id {
            self.target_amount
        } else if self.source_id == account_id {
            -self.source_amount
        } else {
            0
        }
    }
}

/// SQL form of [`Transaction::is_active`].
pub(crate) fn active_condition(as_of: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(Column::DeletedAt.is_null())
        .add(Column::IssuedAt.lte(as_of))
        .add(
            Condition::any()
                .add(Column::ExecutedAt.is_null())
                .add(Column::ExecutedAt.lte(as_of)),
        )
}

/// Transactions where any of `ids` is the source or the target.
pub(crate) fn touching_condition(ids: &[i64]) -> Condition {
    Condition::any()
        .add(Column::SourceId.is_in(ids.to_vec()))
        .add(Column::TargetId.is_in(ids.to_vec()))
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub source_amount: i64,
    pub target_amount: i64,
    pub notes: Option<String>,
    pub issued_at: DateTimeUtc,
    pub executed_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::SourceId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Source,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::TargetId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Transaction {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            source_id: model.source_id,
            target_id: model.target_id,
            source_amount: model.source_amount,
            target_amount: model.target_amount,
            notes: model.notes,
            issued_at: model.issued_at,
            executed_at: model.executed_at,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn transfer(executed_at: Option<DateTime<Utc>>) -> Transaction {
        Transaction {
            id: 1,
            source_id: 10,
            target_id: 20,
            source_amount: 200,
            target_amount: 180,
            notes: None,
            issued_at: now(),
            executed_at,
            deleted_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn missing_execution_settles_at_issue() {
        let tx = transfer(None);
        assert!(tx.is_active(now()));
        assert!(!tx.is_active(now() - Duration::seconds(1)));
        assert_eq!(tx.effective_at(), now());
    }

    #[test]
    fn future_execution_is_pending() {
        let tx = transfer(Some(now() + Duration::days(10)));
        assert!(!tx.is_active(now()));
        assert!(tx.is_pending(now()));
        assert!(tx.is_active(now() + Duration::days(11)));
        assert_eq!(tx.effective_date(), (now() + Duration::days(10)).date_naive());
    }

    #[test]
    fn deleted_never_counts() {
        let mut tx = transfer(None);
        tx.deleted_at = Some(now());
        assert!(!tx.is_active(now() + Duration::days(1)));
        assert!(!tx.is_pending(now()));
    }

    #[test]
    fn signed_amount_depends_on_side() {
        let tx = transfer(None);
        assert_eq!(tx.signed_amount_for(10), -200);
        assert_eq!(tx.signed_amount_for(20), 180);
        assert_eq!(tx.signed_amount_for(30), 0);
        assert_eq!(tx.counterparty(10), Some(20));
        assert_eq!(tx.counterparty(30), None);
    }
}
