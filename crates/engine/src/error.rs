//! The module contains the errors the engine can throw.
//!
//! Errors fall in four families:
//!
//! - not-found: [`KeyNotFound`]
//! - invariant violations: [`KindMismatch`], [`SelfTransfer`],
//!   [`UnsupportedKind`], [`InvalidAccount`], [`InvalidAmount`],
//!   [`InvalidCurrency`], [`InvalidCursor`], [`InvalidWindow`]
//! - storage failures: [`Database`], [`Storage`]
//! - notification failures: [`Notification`]
//!
//! Invariant violations are always raised before anything is written.
//! A [`Notification`] error means the mutation was already committed.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`KindMismatch`]: EngineError::KindMismatch
//!  [`SelfTransfer`]: EngineError::SelfTransfer
//!  [`UnsupportedKind`]: EngineError::UnsupportedKind
//!  [`InvalidAccount`]: EngineError::InvalidAccount
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidCurrency`]: EngineError::InvalidCurrency
//!  [`InvalidCursor`]: EngineError::InvalidCursor
//!  [`InvalidWindow`]: EngineError::InvalidWindow
//!  [`Database`]: EngineError::Database
//!  [`Storage`]: EngineError::Storage
//!  [`Notification`]: EngineError::Notification
use sea_orm::DbErr;
use thiserror::Error;

use crate::events::NotifyError;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Kind mismatch: {0}")]
    KindMismatch(String),
    #[error("Self transfer: {0}")]
    SelfTransfer(String),
    #[error("Unsupported kind: {0}")]
    UnsupportedKind(String),
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Invalid window: {0}")]
    InvalidWindow(String),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("storage failure while {step}: {source}")]
    Storage {
        step: &'static str,
        #[source]
        source: DbErr,
    },
    #[error("notification failed after commit: {0}")]
    Notification(#[from] NotifyError),
}

impl EngineError {
    /// Wraps a database error with the step of a multi-step command that
    /// produced it.
    pub(crate) fn storage(step: &'static str) -> impl FnOnce(DbErr) -> EngineError {
        move |source| EngineError::Storage { step, source }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }

    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch(_)
                | Self::SelfTransfer(_)
                | Self::UnsupportedKind(_)
                | Self::InvalidAccount(_)
                | Self::InvalidAmount(_)
                | Self::InvalidCurrency(_)
                | Self::InvalidCursor(_)
                | Self::InvalidWindow(_)
        )
    }

    /// `true` when the command's mutation is durable even though an error is
    /// returned.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Notification(_))
    }

    /// Message safe to show to a caller.
    ///
    /// Storage and notification causes are logged and replaced by a generic
    /// signal.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(err) => {
                tracing::error!("database error: {err}");
                "internal error".to_string()
            }
            Self::Storage { step, source } => {
                tracing::error!("storage failure while {step}: {source}");
                "internal error".to_string()
            }
            Self::Notification(err) => {
                tracing::error!("notification failure: {err}");
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::KindMismatch(a), Self::KindMismatch(b)) => a == b,
            (Self::SelfTransfer(a), Self::SelfTransfer(b)) => a == b,
            (Self::UnsupportedKind(a), Self::UnsupportedKind(b)) => a == b,
            (Self::InvalidAccount(a), Self::InvalidAccount(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::InvalidWindow(a), Self::InvalidWindow(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (
                Self::Storage {
                    step: a,
                    source: sa,
                },
                Self::Storage {
                    step: b,
                    source: sb,
                },
            ) => a == b && sa.to_string() == sb.to_string(),
            (Self::Notification(a), Self::Notification(b)) => a == b,
            _ => false,
        }
    }
}
