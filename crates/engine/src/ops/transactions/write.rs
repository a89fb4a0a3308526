use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*,
};

use crate::{
    Account, EngineError, NewTransactionCmd, ResultEngine, Transaction, TransactionEvent,
    accounts, transactions,
    util::{normalize_optional_text, validate_positive_amount},
};

use super::super::{Engine, with_tx};

/// Checks everything that does not need storage.
fn validate_new_transaction(cmd: &NewTransactionCmd) -> ResultEngine<()> {
    if cmd.source_id == cmd.target_id {
        return Err(EngineError::SelfTransfer(format!(
            "account {} cannot transfer to itself",
            cmd.source_id
        )));
    }
    validate_positive_amount(cmd.source_amount, "source amount")?;
    if let Some(target_amount) = cmd.target_amount {
        validate_positive_amount(target_amount, "target amount")?;
    }
    if let Some(executed_at) = cmd.executed_at
        && executed_at < cmd.issued_at
    {
        return Err(EngineError::InvalidAmount(
            "executed_at must not precede issued_at".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the amount credited to the target.
///
/// Same currency: defaults to and must equal the source amount. Different
/// currencies: must be given.
fn resolve_target_amount(
    source: &Account,
    target: &Account,
    cmd: &NewTransactionCmd,
) -> ResultEngine<i64> {
    match cmd.target_amount {
        None if source.currency == target.currency => Ok(cmd.source_amount),
        None => Err(EngineError::InvalidAmount(format!(
            "target amount is required for a {} -> {} transfer",
            source.currency, target.currency
        ))),
        Some(amount) if source.currency == target.currency && amount != cmd.source_amount => {
            Err(EngineError::InvalidAmount(
                "target amount must equal source amount in the same currency".to_string(),
            ))
        }
        Some(amount) => Ok(amount),
    }
}

impl Engine {
    async fn require_endpoint(
        &self,
        db: &DatabaseTransaction,
        account_id: i64,
    ) -> ResultEngine<Account> {
        let account = Account::try_from(self.require_account(db, account_id).await?)?;
        if account.is_history() {
            return Err(EngineError::InvalidAccount(
                "history accounts are managed by the engine".to_string(),
            ));
        }
        Ok(account)
    }

    /// Records a transfer between two accounts.
    ///
    /// Without `executed_at` the transfer counts from `issued_at` on; with a
    /// future `executed_at` it stays pending until that instant.
    pub async fn create_transaction(&self, cmd: NewTransactionCmd) -> ResultEngine<Transaction> {
        validate_new_transaction(&cmd)?;
        let notes = normalize_optional_text(cmd.notes.as_deref());

        let tx = with_tx!(self, |db_tx| {
            let source = self.require_endpoint(&db_tx, cmd.source_id).await?;
            let target = self.require_endpoint(&db_tx, cmd.target_id).await?;
            let target_amount = resolve_target_amount(&source, &target, &cmd)?;

            let model = transactions::ActiveModel {
                id: ActiveValue::NotSet,
                source_id: ActiveValue::Set(source.id),
                target_id: ActiveValue::Set(target.id),
                source_amount: ActiveValue::Set(cmd.source_amount),
                target_amount: ActiveValue::Set(target_amount),
                notes: ActiveValue::Set(notes),
                issued_at: ActiveValue::Set(cmd.issued_at),
                executed_at: ActiveValue::Set(cmd.executed_at),
                deleted_at: ActiveValue::Set(None),
                created_at: ActiveValue::Set(cmd.now),
                updated_at: ActiveValue::Set(cmd.now),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::storage("inserting transaction"))?;
            Ok::<_, EngineError>(Transaction::from(model))
        })?;

        tracing::debug!(
            transaction_id = tx.id,
            source_id = tx.source_id,
            target_id = tx.target_id,
            "transaction created"
        );
        self.notify(TransactionEvent::created(tx.clone(), cmd.now))?;
        Ok(tx)
    }

    /// Soft-deletes a transaction.
    ///
    /// History transfers change only through the owning account's update.
    /// Publishes `TransactionDeleted` with the row as deleted.
    pub async fn delete_transaction(
        &self,
        transaction_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let deleted = with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(transaction_id)
                .filter(transactions::Column::DeletedAt.is_null())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;

            let historic = accounts::Entity::find()
                .filter(accounts::Column::Id.is_in([model.source_id, model.target_id]))
                .filter(
                    accounts::Column::Kind.eq(crate::AccountKind::SystemHistoric.as_str()),
                )
                .count(&db_tx)
                .await?;
            if historic > 0 {
                return Err(EngineError::InvalidAccount(
                    "history transfers are edited through their account".to_string(),
                ));
            }

            let model = transactions::ActiveModel {
                id: ActiveValue::Set(transaction_id),
                deleted_at: ActiveValue::Set(Some(now)),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            }
            .update(&db_tx)
            .await
            .map_err(EngineError::storage("soft-deleting transaction"))?;
            Ok::<_, EngineError>(Transaction::from(model))
        })?;

        tracing::debug!(transaction_id, "transaction deleted");
        self.notify(TransactionEvent::deleted(deleted, now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{AccountKind, Currency};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn account(id: i64, currency: Currency) -> Account {
        Account {
            id,
            parent_id: None,
            kind: AccountKind::CapitalNormal,
            currency,
            name: format!("account {id}"),
            description: None,
            color: "#000000".to_string(),
            icon: "bank".to_string(),
            capital: 0,
            archived_at: None,
            deleted_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn self_transfer_is_rejected_before_storage() {
        let cmd = NewTransactionCmd::new(3, 3, 100, now());
        assert!(matches!(
            validate_new_transaction(&cmd),
            Err(EngineError::SelfTransfer(_))
        ));
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(matches!(
            validate_new_transaction(&NewTransactionCmd::new(1, 2, 0, now())),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_new_transaction(&NewTransactionCmd::new(1, 2, 10, now()).target_amount(-1)),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn execution_cannot_precede_issue() {
        let cmd = NewTransactionCmd::new(1, 2, 10, now()).executed_at(now() - Duration::days(1));
        assert!(matches!(
            validate_new_transaction(&cmd),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn target_amount_follows_currencies() {
        let eur = account(1, Currency::Eur);
        let eur_too = account(2, Currency::Eur);
        let usd = account(3, Currency::Usd);

        let cmd = NewTransactionCmd::new(1, 2, 250, now());
        assert_eq!(resolve_target_amount(&eur, &eur_too, &cmd), Ok(250));
        assert!(resolve_target_amount(&eur, &eur_too, &cmd.clone().target_amount(300)).is_err());
        assert!(resolve_target_amount(&eur, &usd, &cmd).is_err());
        assert_eq!(
            resolve_target_amount(&eur, &usd, &cmd.target_amount(270)),
            Ok(270)
        );
    }
}
