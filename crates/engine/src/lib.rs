//! Ledger balance engine.
//!
//! Turns an append-mostly log of transfers between accounts into point in
//! time balances, carry-forward history balances and daily balance series,
//! and enforces the account/transaction lifecycle that keeps those numbers
//! well-defined.
//!
//! The [`Engine`] is the entry point; pure computation lives in [`balance`]
//! and [`series`], lifecycle notifications in [`events`].

pub use accounts::{Account, AccountKind, KindClass};
pub use balance::{ChildBalance, DetailedBalance, HistoryBalance};
pub use commands::{
    AccountDetails, AccountUpdate, ChildAccount, HistoryEdit, HistorySeed, NewAccountCmd,
    NewTransactionCmd, UpdateAccountCmd,
};
pub use currency::Currency;
pub use error::EngineError;
pub use events::{
    AccountEvent, Broker, Event, EventKind, EventSink, NotifyError, Subscriber, TransactionEvent,
};
pub use ops::{AccountFilter, AccountPreview, Engine, EngineBuilder, TransactionListFilter};
pub use series::{DailyBalance, SignConvention};
pub use transactions::Transaction;

pub mod balance;
pub mod events;
pub mod series;

mod accounts;
mod commands;
mod currency;
mod error;
mod ops;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
