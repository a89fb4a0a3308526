use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    Account, AccountEvent, EngineError, ResultEngine, accounts,
    transactions::{self, touching_condition},
};

use super::super::{Engine, with_tx};

impl Engine {
    /// Soft-deletes an account, its direct children and every transaction
    /// touching any of them, atomically.
    ///
    /// Deleting an already deleted account succeeds without publishing an
    /// event. History accounts go away with their parent only.
    pub async fn delete_account(&self, account_id: i64, now: DateTime<Utc>) -> ResultEngine<()> {
        let deleted = with_tx!(self, |db_tx| {
            let Some(model) = accounts::Entity::find_by_id(account_id).one(&db_tx).await? else {
                return Err(EngineError::KeyNotFound("account not exists".to_string()));
            };
            let previous = Account::try_from(model)?;
            if previous.is_deleted() {
                // Nothing to cascade, the earlier delete already did.
                Ok(None)
            } else {
                self.cascade_delete(&db_tx, previous, now).await.map(Some)
            }
        })?;

        match deleted {
            Some(previous) => self.notify(AccountEvent::deleted(previous, now)),
            None => Ok(()),
        }
    }

    async fn cascade_delete(
        &self,
        db: &DatabaseTransaction,
        previous: Account,
        now: DateTime<Utc>,
    ) -> ResultEngine<Account> {
        let account_id = previous.id;
        if previous.is_history() {
            return Err(EngineError::InvalidAccount(
                "history accounts are deleted with their parent".to_string(),
            ));
        }

        let mut ids = vec![account_id];
        ids.extend(
            self.children_of(db, account_id)
                .await?
                .into_iter()
                .map(|child| child.id),
        );

        accounts::Entity::update_many()
            .col_expr(accounts::Column::DeletedAt, Expr::value(now))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.is_in(ids.clone()))
            .filter(accounts::Column::DeletedAt.is_null())
            .exec(db)
            .await
            .map_err(EngineError::storage("soft-deleting accounts"))?;

        let result = transactions::Entity::update_many()
            .col_expr(transactions::Column::DeletedAt, Expr::value(now))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now))
            .filter(touching_condition(&ids))
            .filter(transactions::Column::DeletedAt.is_null())
            .exec(db)
            .await
            .map_err(EngineError::storage("soft-deleting transactions"))?;

        tracing::debug!(
            account_id,
            accounts = ids.len(),
            transactions = result.rows_affected,
            "account deleted"
        );
        Ok(previous)
    }
}
