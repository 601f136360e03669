//! Message, verdict and outcome types shared by the consume and produce paths.

use std::fmt;
use std::time::Duration;

use crate::error::MessageError;

/// Resolved URL of a queue, as returned by the backend's create/resolve call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueueUrl(String);

impl QueueUrl {
    /// Wraps a URL returned by the backend.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QueueUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed out by the backend and currently in flight.
///
/// Lives only for the duration of one `consume` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Identifier assigned by the backend
    pub message_id: String,
    /// Token required to delete the message or change its visibility
    pub receipt_handle: String,
    /// Raw payload
    pub body: String,
    /// Raw value of the backend's `ApproximateReceiveCount` attribute, if reported
    pub receive_count: Option<String>,
}

impl ReceivedMessage {
    /// Delivery attempt count reported by the backend.
    ///
    /// A missing attribute counts as attempt 0. A value that is not a
    /// non-negative integer is an error for this message only.
    pub fn attempt_count(&self) -> Result<u32, MessageError> {
        match self.receive_count.as_deref() {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| MessageError::AttemptCount {
                    value: raw.to_string(),
                }),
        }
    }
}

/// What a handler decided to do with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Processed; remove from the queue.
    Acknowledge,
    /// Failed; make redeliverable right away.
    Reject,
    /// Not now; redeliver after a delay that grows with the attempt count.
    Defer,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Acknowledge => f.write_str("acknowledge"),
            Verdict::Reject => f.write_str("reject"),
            Verdict::Defer => f.write_str("defer"),
        }
    }
}

/// Per-message metadata passed to handlers alongside the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Meta {
    pub attempt_count: u32,
}

/// Action to communicate to the backend for one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Acknowledge,
    RequeueNow,
    RequeueAfter(Duration),
}

/// Longest visibility timeout SQS accepts, in seconds (12 hours).
pub const MAX_VISIBILITY_TIMEOUT_SECS: i32 = 43_200;

impl Outcome {
    /// Visibility timeout to request for a requeue, `None` for acknowledgement.
    ///
    /// Delays are sent in whole seconds and clamped to what the backend accepts.
    pub fn visibility_timeout(&self) -> Option<i32> {
        match self {
            Outcome::Acknowledge => None,
            Outcome::RequeueNow => Some(0),
            Outcome::RequeueAfter(delay) => Some(
                i32::try_from(delay.as_secs())
                    .unwrap_or(i32::MAX)
                    .min(MAX_VISIBILITY_TIMEOUT_SECS),
            ),
        }
    }
}

/// Entry of a batched delete request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteEntry {
    pub id: String,
    pub receipt_handle: String,
}

/// Entry of a batched change-visibility request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityEntry {
    pub id: String,
    pub receipt_handle: String,
    pub visibility_timeout: i32,
}

/// Entry of a batched send request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendEntry {
    pub id: String,
    pub body: String,
}

/// An entry the backend refused inside an otherwise successful batch call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryFailure {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    pub sender_fault: bool,
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {} failed with {}", self.id, self.code)?;
        if let Some(message) = &self.message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}
