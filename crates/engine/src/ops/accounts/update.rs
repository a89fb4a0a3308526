use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    Account, AccountDetails, AccountEvent, AccountKind, AccountUpdate, ChildAccount,
    EngineError, HistoryEdit, KindClass, ResultEngine, UpdateAccountCmd, accounts, transactions,
    util::{normalize_child, normalize_details},
};

use super::super::{Engine, with_tx};
use super::{history_details, history_direction, insert_account, insert_history_transfer};

/// Checks that the update payload matches the class of the submitted kind.
fn validate_strategy(kind: AccountKind, update: &AccountUpdate) -> ResultEngine<()> {
    match (kind.class(), update) {
        (KindClass::Capital, AccountUpdate::Capital { .. })
        | (KindClass::Debt, AccountUpdate::Debt { .. })
        | (KindClass::External, AccountUpdate::External { .. }) => Ok(()),
        (KindClass::System, _) => Err(EngineError::UnsupportedKind(format!(
            "{kind} accounts are managed by the engine"
        ))),
        _ => Err(EngineError::UnsupportedKind(format!(
            "{kind} accounts cannot take this update"
        ))),
    }
}

/// Normalizes submitted children and rejects duplicated existing ids.
fn validate_children(children: Vec<ChildAccount>) -> ResultEngine<Vec<ChildAccount>> {
    let mut seen = HashSet::new();
    children
        .into_iter()
        .map(|child| {
            if !child.is_new() && !seen.insert(child.id) {
                return Err(EngineError::InvalidAccount(format!(
                    "child account {} submitted twice",
                    child.id
                )));
            }
            normalize_child(child)
        })
        .collect()
}

fn details_model(
    id: i64,
    details: &AccountDetails,
    now: DateTime<Utc>,
) -> accounts::ActiveModel {
    accounts::ActiveModel {
        id: ActiveValue::Set(id),
        currency: ActiveValue::Set(details.currency.code().to_string()),
        name: ActiveValue::Set(details.name.clone()),
        description: ActiveValue::Set(details.description.clone()),
        color: ActiveValue::Set(details.color.clone()),
        icon: ActiveValue::Set(details.icon.clone()),
        updated_at: ActiveValue::Set(now),
        ..Default::default()
    }
}

impl Engine {
    /// Updates an account with the strategy matching its kind.
    ///
    /// - capital: details are rewritten in place, the history transfer can
    ///   be replaced or removed
    /// - debt: as capital, plus the stated capital (credit card debt is
    ///   stored as a positive magnitude)
    /// - external: details plus the full list of category children; `id <=
    ///   0` creates a child, a positive id updates the child with that id
    ///
    /// The submitted kind must equal the stored one.
    pub async fn update_account(&self, cmd: UpdateAccountCmd) -> ResultEngine<Account> {
        let UpdateAccountCmd {
            id,
            kind,
            details,
            update,
            now,
        } = cmd;
        validate_strategy(kind, &update)?;
        let details = normalize_details(details)?;
        let update = match update {
            AccountUpdate::External { children } => AccountUpdate::External {
                children: validate_children(children)?,
            },
            other => other,
        };

        let (previous, current) = with_tx!(self, |db_tx| {
            let previous = Account::try_from(self.require_account(&db_tx, id).await?)?;
            if previous.kind != kind {
                return Err(EngineError::KindMismatch(format!(
                    "account {id} is {}, got {kind}",
                    previous.kind
                )));
            }

            let current = match update {
                AccountUpdate::Capital { history } => {
                    self.update_balance_holder(&db_tx, &previous, &details, 0, history, now)
                        .await?
                }
                AccountUpdate::Debt { capital, history } => {
                    let capital = kind.normalize_capital(capital)?;
                    self.update_balance_holder(&db_tx, &previous, &details, capital, history, now)
                        .await?
                }
                AccountUpdate::External { children } => {
                    self.update_external(&db_tx, &previous, &details, children, now)
                        .await?
                }
            };
            Ok::<_, EngineError>((previous, current))
        })?;

        tracing::debug!(account_id = id, kind = kind.as_str(), "account updated");
        self.notify(AccountEvent::updated(previous, current.clone(), now))?;
        Ok(current)
    }

    async fn update_balance_holder(
        &self,
        db: &DatabaseTransaction,
        previous: &Account,
        details: &AccountDetails,
        capital: i64,
        history: HistoryEdit,
        now: DateTime<Utc>,
    ) -> ResultEngine<Account> {
        let mut active = details_model(previous.id, details, now);
        active.capital = ActiveValue::Set(capital);
        let model = active
            .update(db)
            .await
            .map_err(EngineError::storage("updating account"))?;

        let history_account = match self.history_account_of(db, previous.id).await? {
            Some(history_account) => {
                let mut active = details_model(history_account.id, &history_details(details), now);
                active.description = ActiveValue::NotSet;
                active
                    .update(db)
                    .await
                    .map_err(EngineError::storage("updating history account"))?
            }
            None => insert_account(
                db,
                Some(previous.id),
                AccountKind::SystemHistoric,
                &history_details(details),
                0,
                now,
            )
            .await
            .map_err(EngineError::storage("inserting history account"))?,
        };

        match history {
            HistoryEdit::Keep => {}
            HistoryEdit::Remove => {
                self.remove_history_transfers(db, previous.id, history_account.id, now)
                    .await?;
            }
            HistoryEdit::Set(seed) => {
                let existing = self
                    .history_transfers(db, previous.id, history_account.id)
                    .await?;
                match (
                    existing.as_slice(),
                    history_direction(previous.id, history_account.id, seed.balance),
                ) {
                    ([single], Some((source_id, target_id, amount))) => {
                        let active = transactions::ActiveModel {
                            id: ActiveValue::Set(single.id),
                            source_id: ActiveValue::Set(source_id),
                            target_id: ActiveValue::Set(target_id),
                            source_amount: ActiveValue::Set(amount),
                            target_amount: ActiveValue::Set(amount),
                            issued_at: ActiveValue::Set(seed.at),
                            executed_at: ActiveValue::Set(Some(seed.at)),
                            updated_at: ActiveValue::Set(now),
                            ..Default::default()
                        };
                        active
                            .update(db)
                            .await
                            .map_err(EngineError::storage("replacing history transfer"))?;
                    }
                    _ => {
                        self.remove_history_transfers(db, previous.id, history_account.id, now)
                            .await?;
                        insert_history_transfer(db, previous.id, history_account.id, seed, now)
                            .await
                            .map_err(EngineError::storage("inserting history transfer"))?;
                    }
                }
            }
        }

        Account::try_from(model)
    }

    async fn remove_history_transfers(
        &self,
        db: &DatabaseTransaction,
        parent_id: i64,
        history_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let ids: Vec<i64> = self
            .history_transfers(db, parent_id, history_id)
            .await?
            .into_iter()
            .map(|model| model.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        transactions::Entity::update_many()
            .col_expr(transactions::Column::DeletedAt, Expr::value(now))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now))
            .filter(transactions::Column::Id.is_in(ids))
            .exec(db)
            .await
            .map_err(EngineError::storage("removing history transfer"))?;
        Ok(())
    }

    /// Rewrites an external account and upserts its category children.
    ///
    /// Children are joined to stored rows by id. Stored children missing
    /// from `children` are left untouched.
    async fn update_external(
        &self,
        db: &DatabaseTransaction,
        previous: &Account,
        details: &AccountDetails,
        children: Vec<ChildAccount>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Account> {
        let model = details_model(previous.id, details, now)
            .update(db)
            .await
            .map_err(EngineError::storage("updating account"))?;

        let stored: HashSet<i64> = self
            .children_of(db, previous.id)
            .await?
            .into_iter()
            .map(|child| child.id)
            .collect();

        for child in children {
            let child_details = AccountDetails {
                name: child.name,
                description: child.description,
                color: child.color,
                icon: child.icon,
                currency: details.currency,
            };
            if child.id <= 0 {
                insert_account(db, Some(previous.id), previous.kind, &child_details, 0, now)
                    .await
                    .map_err(EngineError::storage("inserting child account"))?;
                continue;
            }
            if !stored.contains(&child.id) {
                return Err(EngineError::KeyNotFound(format!(
                    "child account {} not exists",
                    child.id
                )));
            }
            details_model(child.id, &child_details, now)
                .update(db)
                .await
                .map_err(EngineError::storage("updating child account"))?;
        }

        Account::try_from(model)
    }
}
