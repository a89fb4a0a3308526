use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    Account, AccountDetails, AccountEvent, AccountKind, EngineError, HistorySeed, ResultEngine,
    accounts, transactions,
};

use super::{Engine, with_tx};

mod create;
mod delete;
mod update;

/// Filters for listing accounts.
#[derive(Clone, Debug, Default)]
pub struct AccountFilter {
    /// `None` lists top-level accounts, `Some(id)` the children of `id`.
    pub parent_id: Option<i64>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<AccountKind>>,
    /// If true, includes archived accounts (default: false).
    pub include_archived: bool,
}

/// Inserts an account row with `created_at == updated_at == now`.
async fn insert_account(
    db: &DatabaseTransaction,
    parent_id: Option<i64>,
    kind: AccountKind,
    details: &AccountDetails,
    capital: i64,
    now: DateTime<Utc>,
) -> Result<accounts::Model, DbErr> {
    accounts::ActiveModel {
        id: ActiveValue::NotSet,
        parent_id: ActiveValue::Set(parent_id),
        kind: ActiveValue::Set(kind.as_str().to_string()),
        currency: ActiveValue::Set(details.currency.code().to_string()),
        name: ActiveValue::Set(details.name.clone()),
        description: ActiveValue::Set(details.description.clone()),
        color: ActiveValue::Set(details.color.clone()),
        icon: ActiveValue::Set(details.icon.clone()),
        capital: ActiveValue::Set(capital),
        archived_at: ActiveValue::Set(None),
        deleted_at: ActiveValue::Set(None),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
    }
    .insert(db)
    .await
}

/// Details of the history account paired with `parent`.
fn history_details(parent: &AccountDetails) -> AccountDetails {
    AccountDetails {
        name: format!("{} (history)", parent.name),
        description: None,
        color: parent.color.clone(),
        icon: parent.icon.clone(),
        currency: parent.currency,
    }
}

/// Endpoints and magnitude of the history transfer encoding `balance`.
///
/// A positive balance flows history → parent, a negative one parent →
/// history. Returns `None` for a zero balance.
fn history_direction(parent_id: i64, history_id: i64, balance: i64) -> Option<(i64, i64, i64)> {
    match balance {
        0 => None,
        b if b > 0 => Some((history_id, parent_id, b)),
        b => Some((parent_id, history_id, b.saturating_neg())),
    }
}

/// Inserts the single history transfer dated at the cutover.
async fn insert_history_transfer(
    db: &DatabaseTransaction,
    parent_id: i64,
    history_id: i64,
    seed: HistorySeed,
    now: DateTime<Utc>,
) -> Result<Option<transactions::Model>, DbErr> {
    let Some((source_id, target_id, amount)) = history_direction(parent_id, history_id, seed.balance)
    else {
        return Ok(None);
    };
    transactions::ActiveModel {
        id: ActiveValue::NotSet,
        source_id: ActiveValue::Set(source_id),
        target_id: ActiveValue::Set(target_id),
        source_amount: ActiveValue::Set(amount),
        target_amount: ActiveValue::Set(amount),
        notes: ActiveValue::Set(Some("opening balance".to_string())),
        issued_at: ActiveValue::Set(seed.at),
        executed_at: ActiveValue::Set(Some(seed.at)),
        deleted_at: ActiveValue::Set(None),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
    }
    .insert(db)
    .await
    .map(Some)
}

impl Engine {
    /// Returns a non-deleted account.
    pub async fn account(&self, account_id: i64) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, account_id).await?;
            Account::try_from(model)
        })
    }

    /// Lists non-deleted accounts, ordered by id.
    ///
    /// History accounts are only listed when asked for explicitly through
    /// `kinds`.
    pub async fn accounts(&self, filter: &AccountFilter) -> ResultEngine<Vec<Account>> {
        if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
            return Err(EngineError::UnsupportedKind(
                "kinds must not be empty".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let mut query = accounts::Entity::find()
                .filter(accounts::Column::DeletedAt.is_null())
                .order_by_asc(accounts::Column::Id);
            query = match filter.parent_id {
                Some(parent_id) => query.filter(accounts::Column::ParentId.eq(parent_id)),
                None => query.filter(accounts::Column::ParentId.is_null()),
            };
            query = match &filter.kinds {
                Some(kinds) => query.filter(
                    accounts::Column::Kind.is_in(kinds.iter().map(|k| k.as_str().to_string())),
                ),
                None => query.filter(
                    accounts::Column::Kind.ne(AccountKind::SystemHistoric.as_str()),
                ),
            };
            if !filter.include_archived {
                query = query.filter(accounts::Column::ArchivedAt.is_null());
            }

            let models = query.all(&db_tx).await?;
            models
                .into_iter()
                .map(Account::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Archives or unarchives an account.
    ///
    /// History accounts follow their parent and cannot be archived directly.
    pub async fn set_account_archived(
        &self,
        account_id: i64,
        archived: bool,
        now: DateTime<Utc>,
    ) -> ResultEngine<Account> {
        let (previous, current) = with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, account_id).await?;
            let previous = Account::try_from(model)?;
            if previous.is_history() {
                return Err(EngineError::InvalidAccount(
                    "history accounts cannot be archived".to_string(),
                ));
            }

            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id),
                archived_at: ActiveValue::Set(archived.then_some(now)),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            };
            let current = Account::try_from(active.update(&db_tx).await?)?;
            Ok::<_, EngineError>((previous, current))
        })?;

        tracing::debug!(account_id, archived, "account archive flag changed");
        self.notify(AccountEvent::updated(previous, current.clone(), now))?;
        Ok(current)
    }
}
