//! The operations the client needs from a queue service.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::message::{
    DeleteEntry, EntryFailure, QueueUrl, ReceivedMessage, SendEntry, VisibilityEntry,
};

/// Interface implemented by queue services (SQS and compatibles).
///
/// Batch operations return the entries the service refused; a call-level
/// failure is an `Err`.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Create the queue if needed and return its URL
    async fn create_queue(&self, name: &str) -> Result<QueueUrl, BackendError>;

    /// Long-poll for up to `max_messages` messages
    async fn receive_batch(
        &self,
        queue: &QueueUrl,
        wait_time_seconds: i32,
        max_messages: i32,
    ) -> Result<Vec<ReceivedMessage>, BackendError>;

    async fn delete_batch(
        &self,
        queue: &QueueUrl,
        entries: Vec<DeleteEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError>;

    async fn change_visibility_batch(
        &self,
        queue: &QueueUrl,
        entries: Vec<VisibilityEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError>;

    async fn send_batch(
        &self,
        queue: &QueueUrl,
        entries: Vec<SendEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError>;
}
