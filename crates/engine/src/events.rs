//! Lifecycle notifications.
//!
//! The engine publishes an [`Event`] after every committed command through an
//! injected [`EventSink`]: an [`AccountEvent`] for account
//! create/update/delete, a [`TransactionEvent`] for transaction
//! create/delete. [`Broker`] is the
//! in-process implementation: each subscriber registered for the event kind
//! runs on its own tokio task and `publish` returns without waiting for them.
//! [`Broker::shutdown`] closes the broker and waits for in-flight deliveries.
//!
//! A failing or panicking subscriber is logged and never affects the
//! already-committed mutation.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{Account, Transaction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    TransactionCreated,
    TransactionDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        Self::Created,
        Self::Updated,
        Self::Deleted,
        Self::TransactionCreated,
        Self::TransactionDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::TransactionCreated => "transaction_created",
            Self::TransactionDeleted => "transaction_deleted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub previous: Option<Account>,
    pub current: Option<Account>,
    pub at: DateTime<Utc>,
}

impl AccountEvent {
    pub fn created(account: Account, at: DateTime<Utc>) -> Self {
        Self::new(EventKind::Created, None, Some(account), at)
    }

    pub fn updated(previous: Account, current: Account, at: DateTime<Utc>) -> Self {
        Self::new(EventKind::Updated, Some(previous), Some(current), at)
    }

    pub fn deleted(previous: Account, at: DateTime<Utc>) -> Self {
        Self::new(EventKind::Deleted, Some(previous), None, at)
    }

    fn new(
        kind: EventKind,
        previous: Option<Account>,
        current: Option<Account>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            previous,
            current,
            at,
        }
    }

    /// Id of the account the event is about.
    pub fn account_id(&self) -> Option<i64> {
        self.current
            .as_ref()
            .or(self.previous.as_ref())
            .map(|account| account.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: Uuid,
    pub kind: EventKind,
    /// The transaction as committed: freshly inserted, or carrying its
    /// `deleted_at`.
    pub transaction: Transaction,
    pub at: DateTime<Utc>,
}

impl TransactionEvent {
    pub fn created(transaction: Transaction, at: DateTime<Utc>) -> Self {
        Self::new(EventKind::TransactionCreated, transaction, at)
    }

    pub fn deleted(transaction: Transaction, at: DateTime<Utc>) -> Self {
        Self::new(EventKind::TransactionDeleted, transaction, at)
    }

    fn new(kind: EventKind, transaction: Transaction, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            transaction,
            at,
        }
    }
}

/// Anything the engine publishes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum Event {
    Account(AccountEvent),
    Transaction(TransactionEvent),
}

impl Event {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Account(event) => event.id,
            Self::Transaction(event) => event.id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Account(event) => event.kind,
            Self::Transaction(event) => event.kind,
        }
    }

    /// Id of the account or transaction the event is about.
    pub fn subject_id(&self) -> Option<i64> {
        match self {
            Self::Account(event) => event.account_id(),
            Self::Transaction(event) => Some(event.transaction.id),
        }
    }
}

impl From<AccountEvent> for Event {
    fn from(event: AccountEvent) -> Self {
        Self::Account(event)
    }
}

impl From<TransactionEvent> for Event {
    fn from(event: TransactionEvent) -> Self {
        Self::Transaction(event)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("event broker is closed")]
    Closed,
    #[error("no async runtime available to deliver events")]
    NoRuntime,
    #[error("subscriber failed: {0}")]
    Subscriber(String),
    #[error("no event sink configured")]
    MissingSink,
}

/// A handler for lifecycle events.
#[async_trait::async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), NotifyError>;
}

/// Destination of lifecycle events.
pub trait EventSink: Send + Sync + fmt::Debug {
    fn publish(&self, event: Event) -> Result<(), NotifyError>;
    fn subscribe(&self, kind: EventKind, subscriber: Arc<dyn Subscriber>)
    -> Result<(), NotifyError>;
}

/// In-process fan-out of [`Event`]s.
///
/// Cloning is cheap and every clone shares subscribers and the drain
/// barrier.
#[derive(Clone, Default)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    subscribers: RwLock<HashMap<EventKind, Vec<Arc<dyn Subscriber>>>>,
    in_flight: AtomicUsize,
    drained: Notify,
    closed: AtomicBool,
}

/// Decrements the in-flight counter even if the subscriber panics.
struct InFlight(Arc<BrokerInner>);

impl InFlight {
    fn start(inner: &Arc<BrokerInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(inner))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .subscribers
            .read()
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliveries spawned and not finished yet.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Waits until every spawned delivery has finished.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.drained.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stops accepting events and subscribers, then drains.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.drain().await;
        tracing::debug!("event broker drained");
    }
}

impl EventSink for Broker {
    fn publish(&self, event: Event) -> Result<(), NotifyError> {
        // Counted before the closed check so `drain` cannot miss a publish
        // racing `shutdown`.
        let publishing = InFlight::start(&self.inner);
        if self.is_closed() {
            return Err(NotifyError::Closed);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NotifyError::NoRuntime)?;

        let subscribers = self
            .inner
            .subscribers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        let event = Arc::new(event);
        for subscriber in subscribers {
            let guard = InFlight::start(&self.inner);
            let event = Arc::clone(&event);
            runtime.spawn(async move {
                let _guard = guard;
                if let Err(err) = subscriber.handle(&event).await {
                    tracing::warn!(
                        event_id = %event.id(),
                        kind = event.kind().as_str(),
                        "subscriber failed: {err}"
                    );
                }
            });
        }
        drop(publishing);
        Ok(())
    }

    fn subscribe(
        &self,
        kind: EventKind,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), NotifyError> {
        if self.is_closed() {
            return Err(NotifyError::Closed);
        }
        self.inner
            .subscribers
            .write()
            .entry(kind)
            .or_default()
            .push(subscriber);
        Ok(())
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers: usize = EventKind::ALL
            .into_iter()
            .map(|kind| self.subscriber_count(kind))
            .sum();
        f.debug_struct("Broker")
            .field("subscribers", &subscribers)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}
