use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, Transaction,
    transactions::{self, touching_condition},
};

use super::super::{Engine, with_tx};
use super::{
    TransactionListFilter, effective_at, list_condition, settled_condition, validate_list_filter,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    effective_at: DateTime<Utc>,
    transaction_id: i64,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))
    }

    /// Rows strictly older than the cursor in `(effective_at, id)` order.
    fn older_condition(&self) -> Condition {
        Condition::any()
            .add(Expr::expr(effective_at()).lt(self.effective_at))
            .add(
                Condition::all()
                    .add(Expr::expr(effective_at()).eq(self.effective_at))
                    .add(transactions::Column::Id.lt(self.transaction_id)),
            )
    }
}

impl Engine {
    /// Returns a non-deleted transaction.
    pub async fn transaction(&self, transaction_id: i64) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(transaction_id)
                .filter(transactions::Column::DeletedAt.is_null())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
            Ok(Transaction::from(model))
        })
    }

    /// Transactions of an account not active as of `now`, soonest first.
    pub async fn pending_transactions(
        &self,
        account_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            let models = transactions::Entity::find()
                .filter(touching_condition(&[account_id]))
                .filter(transactions::Column::DeletedAt.is_null())
                .filter(settled_condition(now).not())
                .order_by_asc(effective_at())
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(Transaction::from).collect())
        })
    }

    /// Lists the transactions of an account, with cursor-based pagination.
    ///
    /// Returns `(transaction, signed_amount)` where `signed_amount` is the
    /// contribution to that account. Pagination is newest → older by
    /// `(effective_at DESC, id DESC)`.
    pub async fn list_transactions_for_account_page(
        &self,
        account_id: i64,
        limit: u64,
        cursor: Option<&str>,
        filter: &TransactionListFilter,
        now: DateTime<Utc>,
    ) -> ResultEngine<(Vec<(Transaction, i64)>, Option<String>)> {
        validate_list_filter(filter)?;
        let cursor = cursor.map(TransactionsCursor::decode).transpose()?;

        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = transactions::Entity::find()
                .filter(touching_condition(&[account_id]))
                .filter(list_condition(filter, now))
                .order_by_desc(effective_at())
                .order_by_desc(transactions::Column::Id)
                .limit(limit_plus_one);
            if let Some(cursor) = &cursor {
                query = query.filter(cursor.older_condition());
            }

            let rows: Vec<transactions::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() as u64 > limit;

            let out: Vec<(Transaction, i64)> = rows
                .into_iter()
                .take(limit as usize)
                .map(|model| {
                    let tx = Transaction::from(model);
                    let amount = tx.signed_amount_for(account_id);
                    (tx, amount)
                })
                .collect();

            let next_cursor = if has_more {
                out.last()
                    .map(|(tx, _)| TransactionsCursor {
                        effective_at: tx.effective_at(),
                        transaction_id: tx.id,
                    })
                    .map(|c| c.encode())
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
