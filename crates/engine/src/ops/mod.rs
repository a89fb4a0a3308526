use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{EngineError, Event, EventSink, NotifyError, ResultEngine};

mod access;
mod accounts;
mod balances;
mod transactions;

pub use accounts::AccountFilter;
pub use balances::AccountPreview;
pub use transactions::TransactionListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// An early return through `?` inside the block drops the transaction, which
/// rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    events: Arc<dyn EventSink>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Publishes a lifecycle event after a committed mutation.
    ///
    /// A failure here is reported to the caller, but the mutation stays
    /// committed.
    fn notify(&self, event: impl Into<Event>) -> ResultEngine<()> {
        let event = event.into();
        let kind = event.kind();
        let subject_id = event.subject_id();
        self.events.publish(event).map_err(|err| {
            tracing::error!(
                kind = kind.as_str(),
                subject_id,
                "failed to publish event after commit: {err}"
            );
            EngineError::Notification(err)
        })
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    events: Option<Arc<dyn EventSink>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required event sink lifecycle events are published to
    pub fn events(mut self, events: Arc<dyn EventSink>) -> EngineBuilder {
        self.events = Some(events);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let events = self.events.ok_or(NotifyError::MissingSink)?;
        Ok(Engine {
            database: self.database,
            events,
        })
    }
}
