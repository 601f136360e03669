//! The consumption pipeline: receive, dispatch, classify, reconcile.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::backend::QueueBackend;
use crate::classify::classify;
use crate::client::Client;
use crate::error::{
    chain, Action, BackendError, BatchError, BatchReport, Error, MessageError, MessageFailure,
    ReconciliationError,
};
use crate::handler::Handler;
use crate::message::{
    DeleteEntry, EntryFailure, Meta, QueueUrl, ReceivedMessage, Verdict, VisibilityEntry,
};

/// Pause before `run` polls again after a failed receive, or after an empty
/// one when long polling is off.
const POLL_BACKOFF: Duration = Duration::from_secs(1);

impl<B: QueueBackend> Client<B> {
    /// Receives one batch and settles every message in it.
    ///
    /// Each message is decoded as JSON into `T` and handed to `handler` in its
    /// own task; all tasks run concurrently and are joined before anything is
    /// sent back. Acknowledged messages (and deferred ones past the retry
    /// limit) are removed with one delete-batch call; rejected and deferred
    /// messages are requeued with one change-visibility-batch call. A message
    /// whose payload, receive count or handler failed is left in flight.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the queue cannot be resolved.
    /// - [`Error::Receive`] if the receive call fails; nothing is handled.
    /// - [`Error::Cancelled`] if `cancel` fires before the receive completes.
    /// - [`Error::Batch`] with every per-message and reconciliation error of
    ///   the batch. The other messages are still settled.
    pub async fn consume<T, H>(
        &self,
        cancel: &CancellationToken,
        handler: &Arc<H>,
    ) -> Result<BatchReport, Error>
    where
        T: DeserializeOwned + Send + 'static,
        H: Handler<T> + 'static,
    {
        let queue = self.ensure_connection().await?;

        let messages = match until_cancelled(
            cancel,
            self.backend.receive_batch(
                queue,
                self.config.receive_wait_time(),
                self.config.receive_batch_size(),
            ),
        )
        .await
        {
            None => return Err(Error::Cancelled),
            Some(received) => received.map_err(Error::Receive)?,
        };

        if messages.is_empty() {
            return Ok(BatchReport::default());
        }
        log::debug!("received {} messages from {queue}", messages.len());

        let results = dispatch::<T, H>(handler, &messages, cancel).await;

        let mut deletes = Vec::new();
        let mut requeues = Vec::new();
        let mut failures = Vec::new();
        for (message, result) in messages.iter().zip(results) {
            let outcome = match result {
                Ok((verdict, attempt_count)) => classify(verdict, attempt_count, &self.retry),
                Err(error) => {
                    log::warn!("message {} left in flight: {error}", message.message_id);
                    failures.push(MessageFailure {
                        message_id: message.message_id.clone(),
                        error,
                    });
                    continue;
                }
            };

            match outcome.visibility_timeout() {
                None => deletes.push(DeleteEntry {
                    id: message.message_id.clone(),
                    receipt_handle: message.receipt_handle.clone(),
                }),
                Some(visibility_timeout) => requeues.push(VisibilityEntry {
                    id: message.message_id.clone(),
                    receipt_handle: message.receipt_handle.clone(),
                    visibility_timeout,
                }),
            }
        }

        let report = BatchReport {
            received: messages.len(),
            acknowledged: deletes.len(),
            requeued: requeues.len(),
            failed: failures.len(),
        };
        let reconciliation = self.reconcile(queue, deletes, requeues, cancel).await;

        let err = BatchError {
            report,
            messages: failures,
            reconciliation,
        };
        if err.is_empty() {
            Ok(report)
        } else {
            Err(err.into())
        }
    }

    /// Calls [`Client::consume`] in a loop until `cancel` fires.
    ///
    /// Batch errors are logged and the loop goes on. A failed receive is
    /// retried after a short pause, and so is an empty one if the configured
    /// wait time is zero. Returns the error if the queue cannot be resolved.
    pub async fn run<T, H>(&self, cancel: &CancellationToken, handler: Arc<H>) -> Result<(), Error>
    where
        T: DeserializeOwned + Send + 'static,
        H: Handler<T> + 'static,
    {
        while !cancel.is_cancelled() {
            match self.consume::<T, H>(cancel, &handler).await {
                Ok(report) if report.received > 0 => log::info!(
                    "settled {} messages: {} acknowledged, {} requeued",
                    report.received,
                    report.acknowledged,
                    report.requeued
                ),
                Ok(_) if self.config.receive_wait_time() == 0 => {
                    until_cancelled(cancel, tokio::time::sleep(POLL_BACKOFF)).await;
                }
                Ok(_) => {}
                Err(Error::Cancelled) => break,
                Err(err @ Error::Connection { .. }) => return Err(err),
                Err(err @ Error::Receive(_)) => {
                    log::error!("{}", chain(&err));
                    until_cancelled(cancel, tokio::time::sleep(POLL_BACKOFF)).await;
                }
                Err(err) => log::error!("{err}"),
            }
        }
        Ok(())
    }

    /// Issues at most one delete call and one change-visibility call.
    ///
    /// Both calls are attempted even if the other one fails.
    async fn reconcile(
        &self,
        queue: &QueueUrl,
        deletes: Vec<DeleteEntry>,
        requeues: Vec<VisibilityEntry>,
        cancel: &CancellationToken,
    ) -> Vec<ReconciliationError> {
        let delete = async move {
            if deletes.is_empty() {
                return None;
            }
            let count = deletes.len();
            let result = until_cancelled(cancel, self.backend.delete_batch(queue, deletes)).await;
            settle(Action::Delete, count, result)
        };
        let change_visibility = async move {
            if requeues.is_empty() {
                return None;
            }
            let count = requeues.len();
            let result = until_cancelled(
                cancel,
                self.backend.change_visibility_batch(queue, requeues),
            )
            .await;
            settle(Action::ChangeVisibility, count, result)
        };

        let (deleted, changed) = tokio::join!(delete, change_visibility);
        deleted.into_iter().chain(changed).collect()
    }
}

/// Runs the handler for every message in its own task and joins them all.
///
/// Result `i` belongs to message `i`. Each handler gets a child of `cancel`:
/// it sees the caller's cancellation but cancelling it affects no one else.
async fn dispatch<T, H>(
    handler: &Arc<H>,
    messages: &[ReceivedMessage],
    cancel: &CancellationToken,
) -> Vec<Result<(Verdict, u32), MessageError>>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T> + 'static,
{
    let tasks = messages.iter().cloned().map(|message| {
        let handler = Arc::clone(handler);
        let cancel = cancel.child_token();
        tokio::spawn(async move { handle_message::<T, H>(handler.as_ref(), cancel, message).await })
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap_or_else(|err| Err(MessageError::Panicked(err.to_string()))))
        .collect()
}

async fn handle_message<T, H>(
    handler: &H,
    cancel: CancellationToken,
    message: ReceivedMessage,
) -> Result<(Verdict, u32), MessageError>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    let payload: T = serde_json::from_str(&message.body).map_err(MessageError::Decode)?;
    let attempt_count = message.attempt_count()?;
    let verdict = handler
        .handle(cancel, payload, Meta { attempt_count })
        .await
        .map_err(MessageError::Handler)?;
    Ok((verdict, attempt_count))
}

fn settle(
    action: Action,
    count: usize,
    result: Option<Result<Vec<EntryFailure>, BackendError>>,
) -> Option<ReconciliationError> {
    match result {
        None => Some(ReconciliationError::Cancelled { action, count }),
        Some(Err(error)) => {
            log::warn!("{action} of {count} messages failed: {error}");
            Some(ReconciliationError::Call {
                action,
                count,
                error,
            })
        }
        Some(Ok(failures)) if failures.is_empty() => None,
        Some(Ok(failures)) => Some(ReconciliationError::Entries { action, failures }),
    }
}

/// Resolves to `None` if `cancel` fires before `fut` completes.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
