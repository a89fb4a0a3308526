//! Accounts and their kind taxonomy.
//!
//! An account is either a balance holder (capital and debt kinds), an
//! unbounded category bucket (external kinds) or the synthetic history child
//! of a balance holder (`system_historic`). Accounts nest at most one level:
//! external accounts may own category children, every other non-system
//! account owns exactly one history child.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    CapitalNormal,
    CapitalSavings,
    DebtPersonal,
    DebtLoan,
    DebtCredit,
    ExternalIncome,
    ExternalExpense,
    SystemHistoric,
}

/// Coarse grouping of [`AccountKind`] that drives update dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KindClass {
    Capital,
    Debt,
    External,
    System,
}

impl AccountKind {
    pub const ALL: [AccountKind; 8] = [
        Self::CapitalNormal,
        Self::CapitalSavings,
        Self::DebtPersonal,
        Self::DebtLoan,
        Self::DebtCredit,
        Self::ExternalIncome,
        Self::ExternalExpense,
        Self::SystemHistoric,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CapitalNormal => "capital_normal",
            Self::CapitalSavings => "capital_savings",
            Self::DebtPersonal => "debt_personal",
            Self::DebtLoan => "debt_loan",
            Self::DebtCredit => "debt_credit",
            Self::ExternalIncome => "external_income",
            Self::ExternalExpense => "external_expense",
            Self::SystemHistoric => "system_historic",
        }
    }

    pub fn class(self) -> KindClass {
        match self {
            Self::CapitalNormal | Self::CapitalSavings => KindClass::Capital,
            Self::DebtPersonal | Self::DebtLoan | Self::DebtCredit => KindClass::Debt,
            Self::ExternalIncome | Self::ExternalExpense => KindClass::External,
            Self::SystemHistoric => KindClass::System,
        }
    }

    pub fn is_debt(self) -> bool {
        self.class() == KindClass::Debt
    }

    pub fn is_external(self) -> bool {
        self.class() == KindClass::External
    }

    /// Whether accounts of this kind are paired with a `system_historic`
    /// child on creation.
    pub fn has_history(self) -> bool {
        matches!(self.class(), KindClass::Capital | KindClass::Debt)
    }

    /// Normalizes a submitted capital for this kind.
    ///
    /// Credit card debt is stored as a positive magnitude.
    pub fn normalize_capital(self, capital: i64) -> Result<i64, EngineError> {
        match self {
            Self::DebtCredit => capital
                .checked_abs()
                .ok_or_else(|| EngineError::InvalidAmount("capital too large".to_string())),
            _ => Ok(capital),
        }
    }
}

impl core::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| EngineError::UnsupportedKind(format!("invalid account kind: {value}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub kind: AccountKind,
    pub currency: Currency,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    /// Opening principal for debt kinds, 0 otherwise.
    pub capital: i64,
    pub archived_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_history(&self) -> bool {
        self.kind == AccountKind::SystemHistoric
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub parent_id: Option<i64>,
    pub kind: String,
    pub currency: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub capital: i64,
    pub archived_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Parent,
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            parent_id: model.parent_id,
            kind: AccountKind::try_from(model.kind.as_str())?,
            currency: Currency::try_from(model.currency.as_str())?,
            name: model.name,
            description: model.description,
            color: model.color,
            icon: model.icon,
            capital: model.capital,
            archived_at: model.archived_at,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
