//! # queque-core
//!
//! Typed produce/consume client for SQS-compatible message queues.
//!
//! Consuming receives one batch, runs a handler on every message
//! concurrently, and settles the whole batch with at most two backend calls:
//! one delete for acknowledged messages and one visibility change for
//! requeued ones.
//!
//! ## Features
//!
//! - **Lazy connection**: the queue is created or resolved once, on first use
//! - **Concurrent handling**: one task per received message
//! - **Retry policy**: deferred messages come back after
//!   `retry_timestep * attempt_count`, until `max_retry_count` is exceeded
//! - **Batched settlement**: per-message failures never block the rest of the batch
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use queque::{CancellationToken, Client, Config, HandlerError, Meta, Verdict};
//!
//! # async fn example() -> Result<(), queque::Error> {
//! let mut config = Config::new("orders");
//! config.max_retry_count = 4;
//!
//! let client = Client::new(config).await;
//! let handler = Arc::new(|_cancel: CancellationToken, order: serde_json::Value, meta: Meta| async move {
//!     println!("attempt {}: {order}", meta.attempt_count);
//!     Ok::<_, HandlerError>(Verdict::Defer)
//! });
//!
//! client.run(&CancellationToken::new(), handler).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod classify;
mod client;
mod config;
mod consume;
mod error;
mod handler;
mod message;
mod send;
mod sqs;

#[cfg(test)]
mod test_utils;

pub use backend::QueueBackend;
pub use classify::classify;
pub use client::Client;
pub use config::{Config, ConfigError, RetryPolicy, MAX_BATCH_SIZE, MAX_WAIT_TIME_SECONDS};
pub use error::{
    Action, BackendError, BatchError, BatchReport, Error, HandlerError, MessageError,
    MessageFailure, ProduceError, ReconciliationError,
};
pub use handler::Handler;
pub use message::{
    DeleteEntry, EntryFailure, Meta, Outcome, QueueUrl, ReceivedMessage, SendEntry, Verdict,
    VisibilityEntry, MAX_VISIBILITY_TIMEOUT_SECS,
};
pub use sqs::SqsBackend;
pub use tokio_util::sync::CancellationToken;
