use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    Account, AccountKind, ChildBalance, DailyBalance, DetailedBalance, EngineError,
    HistoryBalance, ResultEngine, accounts, balance, series,
};

use super::{Engine, with_tx};

/// A top-level account with its rolled-up balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPreview {
    pub account: Account,
    pub balance: DetailedBalance,
}

impl Engine {
    async fn balance_in(
        &self,
        db: &DatabaseTransaction,
        account_id: i64,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<i64> {
        let txs = self.load_regular(db, &[account_id], as_of).await?;
        balance::balance(&txs, account_id, as_of)
    }

    async fn history_in(
        &self,
        db: &DatabaseTransaction,
        account_id: i64,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<Option<HistoryBalance>> {
        let Some(history_account) = self.history_account_of(db, account_id).await? else {
            return Ok(None);
        };
        let txs = self.load_history(db, &[account_id], as_of).await?;
        balance::history(&txs, account_id, history_account.id, as_of).map(Some)
    }

    async fn detailed_in(
        &self,
        db: &DatabaseTransaction,
        account: &Account,
        now: DateTime<Utc>,
    ) -> ResultEngine<DetailedBalance> {
        let own = self.balance_in(db, account.id, now).await?;

        let mut children = Vec::new();
        for model in self.children_of(db, account.id).await? {
            let child = Account::try_from(model)?;
            if child.is_history() {
                continue;
            }
            children.push(ChildBalance {
                account_id: child.id,
                kind: child.kind,
                balance: self.balance_in(db, child.id, now).await?,
            });
        }

        Ok(DetailedBalance {
            account_id: account.id,
            kind: account.kind,
            balance: own,
            children,
            history: self.history_in(db, account.id, now).await?,
            capital: account.capital,
        })
    }

    /// Balance of a single account as of `as_of`.
    ///
    /// Pending and deleted transactions, as well as the history transfer,
    /// are left out. An account without transactions has balance 0.
    pub async fn balance(&self, account_id: i64, as_of: DateTime<Utc>) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            self.balance_in(&db_tx, account_id, as_of).await
        })
    }

    /// Balance rolled up with the account's children, plus its history.
    ///
    /// Everything is read inside one transaction.
    pub async fn detailed_balance(
        &self,
        account_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<DetailedBalance> {
        with_tx!(self, |db_tx| {
            let account = Account::try_from(self.require_account(&db_tx, account_id).await?)?;
            self.detailed_in(&db_tx, &account, now).await
        })
    }

    /// Balance carried over from before the account was tracked.
    ///
    /// `None` for accounts without a history account (externals).
    pub async fn history(
        &self,
        account_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<HistoryBalance>> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            self.history_in(&db_tx, account_id, now).await
        })
    }

    /// Daily balance of one account over the `window_days` days ending today.
    ///
    /// The last entry equals [`Engine::balance`] as of `now`.
    pub async fn series(
        &self,
        account_id: i64,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<DailyBalance>> {
        series::window(now.date_naive(), window_days)?;
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            let txs = self.load_regular(&db_tx, &[account_id], now).await?;
            series::series(&txs, &[account_id], now, window_days)
        })
    }

    /// Combined daily balance of every non-deleted account of the given kinds.
    ///
    /// Transfers between two accounts of the set cancel out.
    pub async fn kind_series(
        &self,
        kinds: &[AccountKind],
        window_days: u32,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<DailyBalance>> {
        if kinds.is_empty() {
            return Err(EngineError::UnsupportedKind(
                "kinds must not be empty".to_string(),
            ));
        }
        if let Some(kind) = kinds.iter().find(|kind| **kind == AccountKind::SystemHistoric) {
            return Err(EngineError::UnsupportedKind(format!(
                "{kind} accounts have no series"
            )));
        }
        series::window(now.date_naive(), window_days)?;

        with_tx!(self, |db_tx| {
            let ids: Vec<i64> = accounts::Entity::find()
                .filter(accounts::Column::DeletedAt.is_null())
                .filter(accounts::Column::Kind.is_in(kinds.iter().map(|k| k.as_str())))
                .order_by_asc(accounts::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|model| model.id)
                .collect();
            let txs = self.load_regular(&db_tx, &ids, now).await?;
            series::series(&txs, &ids, now, window_days)
        })
    }

    /// Every non-archived top-level account with its detailed balance, read
    /// from one snapshot.
    pub async fn account_previews(&self, now: DateTime<Utc>) -> ResultEngine<Vec<AccountPreview>> {
        with_tx!(self, |db_tx| {
            let models = accounts::Entity::find()
                .filter(accounts::Column::ParentId.is_null())
                .filter(accounts::Column::DeletedAt.is_null())
                .filter(accounts::Column::ArchivedAt.is_null())
                .filter(accounts::Column::Kind.ne(AccountKind::SystemHistoric.as_str()))
                .order_by_asc(accounts::Column::Id)
                .all(&db_tx)
                .await?;

            let mut previews = Vec::with_capacity(models.len());
            for model in models {
                let account = Account::try_from(model)?;
                let balance = self.detailed_in(&db_tx, &account, now).await?;
                previews.push(AccountPreview { account, balance });
            }
            Ok(previews)
        })
    }
}
