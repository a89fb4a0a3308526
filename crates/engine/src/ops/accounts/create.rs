use sea_orm::TransactionTrait;

use crate::{
    Account, AccountEvent, AccountKind, EngineError, KindClass, NewAccountCmd, ResultEngine,
    util::normalize_details,
};

use super::super::{Engine, with_tx};
use super::{history_details, insert_account, insert_history_transfer};

/// Validates the kind/capital/history combination of a new account.
///
/// Returns the capital to store.
fn validate_new_account(cmd: &NewAccountCmd) -> ResultEngine<i64> {
    let kind = cmd.kind;
    let capital = match kind.class() {
        KindClass::System => {
            return Err(EngineError::UnsupportedKind(format!(
                "{kind} accounts are managed by the engine"
            )));
        }
        KindClass::Debt => kind.normalize_capital(cmd.capital)?,
        KindClass::Capital | KindClass::External if cmd.capital != 0 => {
            return Err(EngineError::InvalidAmount(format!(
                "capital is only allowed on debt accounts, got {} for {kind}",
                cmd.capital
            )));
        }
        KindClass::Capital | KindClass::External => 0,
    };

    if cmd.history.is_some() && !kind.has_history() {
        return Err(EngineError::InvalidAccount(format!(
            "{kind} accounts do not carry a history balance"
        )));
    }
    if cmd.parent_id.is_some() && !kind.is_external() {
        return Err(EngineError::InvalidAccount(format!(
            "{kind} accounts cannot be nested"
        )));
    }
    Ok(capital)
}

impl Engine {
    /// Creates an account.
    ///
    /// Capital and debt accounts are paired with a `system_historic` child
    /// created first. When the command carries a non-zero history seed,
    /// exactly one transfer between the account and its history child is
    /// recorded at the seed date: history → account for a positive balance,
    /// account → history for a negative one.
    ///
    /// External accounts may be created as categories of another top-level
    /// external account of the same kind.
    pub async fn create_account(&self, cmd: NewAccountCmd) -> ResultEngine<Account> {
        let capital = validate_new_account(&cmd)?;
        let details = normalize_details(cmd.details)?;
        let kind = cmd.kind;
        let now = cmd.now;

        let account = with_tx!(self, |db_tx| {
            if let Some(parent_id) = cmd.parent_id {
                let parent = Account::try_from(self.require_account(&db_tx, parent_id).await?)?;
                if parent.parent_id.is_some() {
                    return Err(EngineError::InvalidAccount(
                        "accounts nest one level only".to_string(),
                    ));
                }
                if parent.kind != kind {
                    return Err(EngineError::KindMismatch(format!(
                        "category of a {} account must be {}, got {kind}",
                        parent.kind, parent.kind
                    )));
                }
            }

            let model = insert_account(&db_tx, cmd.parent_id, kind, &details, capital, now)
                .await
                .map_err(EngineError::storage("inserting account"))?;

            if kind.has_history() {
                let history = insert_account(
                    &db_tx,
                    Some(model.id),
                    AccountKind::SystemHistoric,
                    &history_details(&details),
                    0,
                    now,
                )
                .await
                .map_err(EngineError::storage("inserting history account"))?;

                if let Some(seed) = cmd.history {
                    insert_history_transfer(&db_tx, model.id, history.id, seed, now)
                        .await
                        .map_err(EngineError::storage("inserting history transfer"))?;
                }
            }

            Account::try_from(model)
        })?;

        tracing::debug!(account_id = account.id, kind = kind.as_str(), "account created");
        self.notify(AccountEvent::created(account.clone(), now))?;
        Ok(account)
    }
}
