use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::QueueBackend;
use crate::error::BackendError;
use crate::message::{
    DeleteEntry, EntryFailure, QueueUrl, ReceivedMessage, SendEntry, VisibilityEntry,
};

/// A backend call as seen by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateQueue(String),
    Receive {
        wait_time_seconds: i32,
        max_messages: i32,
    },
    Delete(Vec<DeleteEntry>),
    ChangeVisibility(Vec<VisibilityEntry>),
    Send(Vec<SendEntry>),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    batches: VecDeque<Vec<ReceivedMessage>>,
    fail_create: bool,
    fail_receive: bool,
    fail_delete: bool,
    fail_change_visibility: bool,
    fail_send: bool,
    rejected: HashSet<String>,
}

/// In-memory backend that records every call and serves queued batches.
#[derive(Default)]
pub struct RecordingBackend {
    state: Mutex<State>,
    create_calls: AtomicUsize,
    create_delay: Duration,
}

impl RecordingBackend {
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Queues a batch to be returned by the next receive call.
    pub fn push_batch(&self, batch: Vec<ReceivedMessage>) {
        self.state.lock().unwrap().batches.push_back(batch);
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub fn fail_receive(&self, fail: bool) {
        self.state.lock().unwrap().fail_receive = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }

    pub fn fail_change_visibility(&self, fail: bool) {
        self.state.lock().unwrap().fail_change_visibility = fail;
    }

    pub fn fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    /// Entries with this id are reported as failed by every batch call.
    pub fn reject_entry(&self, id: &str) {
        self.state.lock().unwrap().rejected.insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> Vec<Vec<DeleteEntry>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete(entries) => Some(entries),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_changes(&self) -> Vec<Vec<VisibilityEntry>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ChangeVisibility(entries) => Some(entries),
                _ => None,
            })
            .collect()
    }

    pub fn sends(&self) -> Vec<Vec<SendEntry>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send(entries) => Some(entries),
                _ => None,
            })
            .collect()
    }

    fn rejections<'a>(&self, ids: impl Iterator<Item = &'a String>) -> Vec<EntryFailure> {
        let state = self.state.lock().unwrap();
        ids.filter(|id| state.rejected.contains(*id))
            .map(|id| EntryFailure {
                id: id.clone(),
                code: "ReceiptHandleIsInvalid".into(),
                message: Some("rejected by test backend".into()),
                sender_fault: true,
            })
            .collect()
    }
}

#[async_trait]
impl QueueBackend for RecordingBackend {
    async fn create_queue(&self, name: &str) -> Result<QueueUrl, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateQueue(name.to_string()));
        if state.fail_create {
            return Err(BackendError::new("CreateQueue", "connection refused"));
        }
        Ok(QueueUrl::new(format!(
            "http://sqs.us-east-1.localhost:4566/000000000000/{name}"
        )))
    }

    async fn receive_batch(
        &self,
        _queue: &QueueUrl,
        wait_time_seconds: i32,
        max_messages: i32,
    ) -> Result<Vec<ReceivedMessage>, BackendError> {
        let batch = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Receive {
                wait_time_seconds,
                max_messages,
            });
            if state.fail_receive {
                return Err(BackendError::new("ReceiveMessage", "service unavailable"));
            }
            state.batches.pop_front()
        };

        match batch {
            Some(batch) => Ok(batch),
            // Stand-in for the long-poll wait on an empty queue
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete_batch(
        &self,
        _queue: &QueueUrl,
        entries: Vec<DeleteEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError> {
        let failures = self.rejections(entries.iter().map(|entry| &entry.id));
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(entries));
        if state.fail_delete {
            return Err(BackendError::new("DeleteMessageBatch", "service unavailable"));
        }
        Ok(failures)
    }

    async fn change_visibility_batch(
        &self,
        _queue: &QueueUrl,
        entries: Vec<VisibilityEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError> {
        let failures = self.rejections(entries.iter().map(|entry| &entry.id));
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ChangeVisibility(entries));
        if state.fail_change_visibility {
            return Err(BackendError::new(
                "ChangeMessageVisibilityBatch",
                "service unavailable",
            ));
        }
        Ok(failures)
    }

    async fn send_batch(
        &self,
        _queue: &QueueUrl,
        entries: Vec<SendEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError> {
        let failures = self.rejections(entries.iter().map(|entry| &entry.id));
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Send(entries));
        if state.fail_send {
            return Err(BackendError::new("SendMessageBatch", "service unavailable"));
        }
        Ok(failures)
    }
}

/// Builds a received message with the given id, body and receive count.
pub fn message(id: &str, body: &str, receive_count: Option<u32>) -> ReceivedMessage {
    ReceivedMessage {
        message_id: id.to_string(),
        receipt_handle: format!("receipt-{id}"),
        body: body.to_string(),
        receive_count: receive_count.map(|count| count.to_string()),
    }
}
