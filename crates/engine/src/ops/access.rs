use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder,
    prelude::*,
    sea_query::{Query, SelectStatement},
};

use crate::{
    AccountKind, EngineError, ResultEngine, Transaction, accounts,
    transactions::{self, active_condition, touching_condition},
};

use super::Engine;

/// `SELECT id FROM accounts WHERE kind = 'system_historic'`.
fn history_account_ids() -> SelectStatement {
    Query::select()
        .column(accounts::Column::Id)
        .from(accounts::Entity)
        .and_where(accounts::Column::Kind.eq(AccountKind::SystemHistoric.as_str()))
        .to_owned()
}

/// Transfers where neither endpoint is a history account.
pub(super) fn regular_condition() -> Condition {
    Condition::all()
        .add(transactions::Column::SourceId.not_in_subquery(history_account_ids()))
        .add(transactions::Column::TargetId.not_in_subquery(history_account_ids()))
}

/// Transfers where one endpoint is a history account.
pub(super) fn history_condition() -> Condition {
    Condition::any()
        .add(transactions::Column::SourceId.in_subquery(history_account_ids()))
        .add(transactions::Column::TargetId.in_subquery(history_account_ids()))
}

impl Engine {
    /// Loads a non-deleted account or fails with `KeyNotFound`.
    pub(super) async fn require_account(
        &self,
        db: &DatabaseTransaction,
        account_id: i64,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(account_id)
            .filter(accounts::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }

    /// Non-deleted direct children of `parent_id`, history account included.
    pub(super) async fn children_of(
        &self,
        db: &DatabaseTransaction,
        parent_id: i64,
    ) -> ResultEngine<Vec<accounts::Model>> {
        accounts::Entity::find()
            .filter(accounts::Column::ParentId.eq(parent_id))
            .filter(accounts::Column::DeletedAt.is_null())
            .order_by_asc(accounts::Column::Id)
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// The non-deleted `system_historic` child of `parent_id`, if any.
    pub(super) async fn history_account_of(
        &self,
        db: &DatabaseTransaction,
        parent_id: i64,
    ) -> ResultEngine<Option<accounts::Model>> {
        accounts::Entity::find()
            .filter(accounts::Column::ParentId.eq(parent_id))
            .filter(accounts::Column::Kind.eq(AccountKind::SystemHistoric.as_str()))
            .filter(accounts::Column::DeletedAt.is_null())
            .order_by_asc(accounts::Column::Id)
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Active, non-history transfers touching any of `ids` as of `as_of`.
    pub(super) async fn load_regular(
        &self,
        db: &DatabaseTransaction,
        ids: &[i64],
        as_of: DateTime<Utc>,
    ) -> ResultEngine<Vec<Transaction>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = transactions::Entity::find()
            .filter(touching_condition(ids))
            .filter(active_condition(as_of))
            .filter(regular_condition())
            .order_by_asc(transactions::Column::Id)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Transaction::from).collect())
    }

    /// Active history transfers touching any of `ids` as of `as_of`.
    pub(super) async fn load_history(
        &self,
        db: &DatabaseTransaction,
        ids: &[i64],
        as_of: DateTime<Utc>,
    ) -> ResultEngine<Vec<Transaction>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = transactions::Entity::find()
            .filter(touching_condition(ids))
            .filter(active_condition(as_of))
            .filter(history_condition())
            .order_by_asc(transactions::Column::Id)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Transaction::from).collect())
    }

    /// Non-deleted history transfers between `parent_id` and `history_id`,
    /// pending ones included.
    pub(super) async fn history_transfers(
        &self,
        db: &DatabaseTransaction,
        parent_id: i64,
        history_id: i64,
    ) -> ResultEngine<Vec<transactions::Model>> {
        transactions::Entity::find()
            .filter(touching_condition(&[parent_id]))
            .filter(touching_condition(&[history_id]))
            .filter(transactions::Column::DeletedAt.is_null())
            .order_by_asc(transactions::Column::Id)
            .all(db)
            .await
            .map_err(Into::into)
    }
}
