//! Error types for queue operations.

use std::fmt::{self, Write};

use thiserror::Error;

use crate::message::EntryFailure;

/// Error returned by a handler. Any error type can be boxed into it.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single backend call.
#[derive(Clone, Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct BackendError {
    pub operation: &'static str,
    pub message: String,
}

impl BackendError {
    /// Error of `operation` described by `message`, e.g. from a backend other than SQS.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// Builds an error from an SDK error, keeping its whole source chain in the message.
    pub fn from_sdk<E>(operation: &'static str, err: &E) -> Self
    where
        E: std::error::Error,
    {
        Self {
            operation,
            message: chain(err),
        }
    }
}

/// Renders `err` followed by each of its sources, separated by `: `.
pub(crate) fn chain(err: &dyn std::error::Error) -> String {
    let mut message = String::new();
    // Writing into a String cannot fail
    let _ = write_err(&mut message, err);
    message
}

fn write_err(s: &mut String, err: &dyn std::error::Error) -> fmt::Result {
    write!(s, "{err}")?;
    if let Some(source) = err.source() {
        write!(s, ": ")?;
        write_err(s, source)?;
    }

    Ok(())
}

/// Why one message of a batch could not be classified.
///
/// A message in this state is neither deleted nor requeued; it stays in flight
/// until the backend's own visibility timeout lapses.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to decode payload: {0}")]
    Decode(serde_json::Error),

    #[error("invalid receive count attribute `{value}`")]
    AttemptCount { value: String },

    #[error("handler failed: {0}")]
    Handler(HandlerError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// A per-message error tagged with the message it belongs to.
#[derive(Debug, Error)]
#[error("message {message_id}: {error}")]
pub struct MessageFailure {
    pub message_id: String,
    pub error: MessageError,
}

/// The two batched calls issued after classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Delete,
    ChangeVisibility,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Delete => f.write_str("delete batch"),
            Action::ChangeVisibility => f.write_str("change visibility batch"),
        }
    }
}

/// Failure to communicate dispositions to the backend.
///
/// The affected messages stay in flight and are redelivered by the backend.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("{action} of {count} messages failed: {error}")]
    Call {
        action: Action,
        count: usize,
        error: BackendError,
    },

    #[error("{action} of {count} messages cancelled")]
    Cancelled { action: Action, count: usize },

    #[error("{action} rejected {} entries: {}", .failures.len(), join(.failures))]
    Entries {
        action: Action,
        failures: Vec<EntryFailure>,
    },
}

/// Counts of what one `consume` call did with its batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub acknowledged: usize,
    pub requeued: usize,
    pub failed: usize,
}

/// Every error of one batch, joined.
///
/// Returned when at least one message failed or a reconciliation call failed.
/// `report` still describes what was sent to the backend for the rest of the batch.
#[derive(Debug)]
pub struct BatchError {
    pub report: BatchReport,
    pub messages: Vec<MessageFailure>,
    pub reconciliation: Vec<ReconciliationError>,
}

impl BatchError {
    /// True if no message and no reconciliation call failed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.reconciliation.is_empty()
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} messages failed",
            self.messages.len(),
            self.report.received
        )?;
        if !self.reconciliation.is_empty() {
            write!(f, ", {} reconciliation errors", self.reconciliation.len())?;
        }
        for failure in &self.messages {
            write!(f, "\n{failure}")?;
        }
        for err in &self.reconciliation {
            write!(f, "\n{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Failures of a `produce` call, one per failed send call or refused entry.
#[derive(Debug, Default)]
pub struct ProduceError {
    pub calls: Vec<BackendError>,
    pub entries: Vec<EntryFailure>,
}

impl fmt::Display for ProduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} send calls failed, {} entries rejected",
            self.calls.len(),
            self.entries.len()
        )?;
        for err in &self.calls {
            write!(f, "\n{err}")?;
        }
        for failure in &self.entries {
            write!(f, "\n{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProduceError {}

/// Top-level error of client operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to resolve queue `{queue}`")]
    Connection {
        queue: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to receive messages")]
    Receive(#[source] BackendError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to encode payload")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Produce(#[from] ProduceError),
}

fn join(failures: &[EntryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
