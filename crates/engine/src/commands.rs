//! Command structs for engine operations.
//!
//! These types group parameters for write operations (account create/update,
//! transaction create), keeping call sites readable and avoiding long
//! argument lists. Every command carries the `now` the whole operation sees.

use chrono::{DateTime, Utc};

use crate::{AccountKind, Currency};

pub const DEFAULT_COLOR: &str = "#9e9e9e";
pub const DEFAULT_ICON: &str = "wallet";

/// Opening balance of an account and the date tracking started.
///
/// Positive balances flow history → account, negative ones account →
/// history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistorySeed {
    pub balance: i64,
    pub at: DateTime<Utc>,
}

/// Fields shared by every account, editable on update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountDetails {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub currency: Currency,
}

impl AccountDetails {
    #[must_use]
    pub fn new(name: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: DEFAULT_COLOR.to_string(),
            icon: DEFAULT_ICON.to_string(),
            currency,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Create an account.
#[derive(Clone, Debug)]
pub struct NewAccountCmd {
    pub kind: AccountKind,
    pub parent_id: Option<i64>,
    pub details: AccountDetails,
    pub capital: i64,
    pub history: Option<HistorySeed>,
    pub now: DateTime<Utc>,
}

impl NewAccountCmd {
    #[must_use]
    pub fn new(
        kind: AccountKind,
        name: impl Into<String>,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            parent_id: None,
            details: AccountDetails::new(name, currency),
            capital: 0,
            history: None,
            now,
        }
    }

    #[must_use]
    pub fn parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn details(mut self, details: AccountDetails) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn capital(mut self, capital: i64) -> Self {
        self.capital = capital;
        self
    }

    #[must_use]
    pub fn history(mut self, balance: i64, at: DateTime<Utc>) -> Self {
        self.history = Some(HistorySeed { balance, at });
        self
    }
}

/// Edit to the single history transfer of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryEdit {
    #[default]
    Keep,
    Set(HistorySeed),
    Remove,
}

/// A category child submitted with an external account update.
///
/// `id <= 0` marks a new child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildAccount {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
}

impl ChildAccount {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::existing(0, name)
    }

    #[must_use]
    pub fn existing(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            color: DEFAULT_COLOR.to_string(),
            icon: DEFAULT_ICON.to_string(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id <= 0
    }
}

/// Per-kind update payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountUpdate {
    Capital { history: HistoryEdit },
    Debt { capital: i64, history: HistoryEdit },
    External { children: Vec<ChildAccount> },
}

/// Update an account.
///
/// `kind` is the kind the caller believes the account has; the update is
/// rejected when it differs from the stored one.
#[derive(Clone, Debug)]
pub struct UpdateAccountCmd {
    pub id: i64,
    pub kind: AccountKind,
    pub details: AccountDetails,
    pub update: AccountUpdate,
    pub now: DateTime<Utc>,
}

impl UpdateAccountCmd {
    #[must_use]
    pub fn capital(
        id: i64,
        kind: AccountKind,
        details: AccountDetails,
        history: HistoryEdit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            details,
            update: AccountUpdate::Capital { history },
            now,
        }
    }

    #[must_use]
    pub fn debt(
        id: i64,
        kind: AccountKind,
        details: AccountDetails,
        capital: i64,
        history: HistoryEdit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            details,
            update: AccountUpdate::Debt { capital, history },
            now,
        }
    }

    #[must_use]
    pub fn external(
        id: i64,
        kind: AccountKind,
        details: AccountDetails,
        children: Vec<ChildAccount>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            details,
            update: AccountUpdate::External { children },
            now,
        }
    }
}

/// Create a transfer between two accounts.
#[derive(Clone, Debug)]
pub struct NewTransactionCmd {
    pub source_id: i64,
    pub target_id: i64,
    pub source_amount: i64,
    /// Defaults to `source_amount`; required when currencies differ.
    pub target_amount: Option<i64>,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl NewTransactionCmd {
    #[must_use]
    pub fn new(source_id: i64, target_id: i64, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            source_id,
            target_id,
            source_amount: amount,
            target_amount: None,
            notes: None,
            issued_at: now,
            executed_at: None,
            now,
        }
    }

    #[must_use]
    pub fn target_amount(mut self, amount: i64) -> Self {
        self.target_amount = Some(amount);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }

    #[must_use]
    pub fn executed_at(mut self, executed_at: DateTime<Utc>) -> Self {
        self.executed_at = Some(executed_at);
        self
    }
}
