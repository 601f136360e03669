//! SQS implementation of [`QueueBackend`].

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use sqs::types::{
    BatchResultErrorEntry, ChangeMessageVisibilityBatchRequestEntry,
    DeleteMessageBatchRequestEntry, Message, MessageSystemAttributeName,
    SendMessageBatchRequestEntry,
};

use crate::backend::QueueBackend;
use crate::error::BackendError;
use crate::message::{
    DeleteEntry, EntryFailure, QueueUrl, ReceivedMessage, SendEntry, VisibilityEntry,
};

/// Queue backend talking to SQS, or any service speaking the SQS API
/// (LocalStack, Yandex Message Queue).
///
/// # Example
///
/// ```no_run
/// use queque::{Config, SqsBackend};
///
/// # async fn example() {
/// let config = Config::new("orders");
/// let backend = SqsBackend::from_config(&config.load_sdk_config().await);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SqsBackend {
    /// The SQS client instance
    pub client: sqs::Client,
}

impl SqsBackend {
    /// Creates a backend from a pre-built AWS SDK config.
    ///
    /// The caller decides credentials and endpoint, see
    /// [`Config::load_sdk_config`](crate::Config::load_sdk_config).
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            client: sqs::Client::new(config),
        }
    }

    /// Wraps an existing SQS client, e.g. one shared with other code.
    pub fn from_client(client: sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueBackend for SqsBackend {
    async fn create_queue(&self, name: &str) -> Result<QueueUrl, BackendError> {
        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| BackendError::from_sdk("CreateQueue", &e))?;

        output
            .queue_url()
            .map(QueueUrl::new)
            .ok_or_else(|| BackendError::new("CreateQueue", "response carried no queue URL"))
    }

    /// Receives up to `max_messages` messages, waiting up to `wait_time_seconds`
    /// for the first one to arrive.
    ///
    /// Only the `ApproximateReceiveCount` system attribute is requested.
    /// Messages missing an id, receipt handle or body cannot be acted on and
    /// are dropped from the batch with a warning; the service redelivers them.
    async fn receive_batch(
        &self,
        queue: &QueueUrl,
        wait_time_seconds: i32,
        max_messages: i32,
    ) -> Result<Vec<ReceivedMessage>, BackendError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue.as_str())
            .wait_time_seconds(wait_time_seconds)
            .max_number_of_messages(max_messages)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| BackendError::from_sdk("ReceiveMessage", &e))?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(from_aws_message)
            .collect())
    }

    async fn delete_batch(
        &self,
        queue: &QueueUrl,
        entries: Vec<DeleteEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.receipt_handle)
                    .build()
                    .map_err(|e| BackendError::from_sdk("DeleteMessageBatch", &e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .delete_message_batch()
            .queue_url(queue.as_str())
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| BackendError::from_sdk("DeleteMessageBatch", &e))?;

        Ok(output.failed().iter().map(entry_failure).collect())
    }

    async fn change_visibility_batch(
        &self,
        queue: &QueueUrl,
        entries: Vec<VisibilityEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                ChangeMessageVisibilityBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.receipt_handle)
                    .visibility_timeout(entry.visibility_timeout)
                    .build()
                    .map_err(|e| BackendError::from_sdk("ChangeMessageVisibilityBatch", &e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .change_message_visibility_batch()
            .queue_url(queue.as_str())
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| BackendError::from_sdk("ChangeMessageVisibilityBatch", &e))?;

        Ok(output.failed().iter().map(entry_failure).collect())
    }

    async fn send_batch(
        &self,
        queue: &QueueUrl,
        entries: Vec<SendEntry>,
    ) -> Result<Vec<EntryFailure>, BackendError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                SendMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .message_body(entry.body)
                    .delay_seconds(0)
                    .build()
                    .map_err(|e| BackendError::from_sdk("SendMessageBatch", &e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .send_message_batch()
            .queue_url(queue.as_str())
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| BackendError::from_sdk("SendMessageBatch", &e))?;

        Ok(output.failed().iter().map(entry_failure).collect())
    }
}

/// Converts an AWS SDK Message into a [`ReceivedMessage`].
///
/// # See Also
///
/// - [AWS SQS Message API Reference](https://docs.aws.amazon.com/AWSSimpleQueueService/latest/APIReference/API_Message.html)
fn from_aws_message(message: Message) -> Option<ReceivedMessage> {
    let receive_count = message
        .attributes()
        .and_then(|attributes| {
            attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount)
        })
        .cloned();

    match (message.message_id, message.receipt_handle, message.body) {
        (Some(message_id), Some(receipt_handle), Some(body)) => Some(ReceivedMessage {
            message_id,
            receipt_handle,
            body,
            receive_count,
        }),
        (message_id, _, _) => {
            log::warn!(
                "dropping incomplete message {} from batch",
                message_id.as_deref().unwrap_or("<no id>")
            );
            None
        }
    }
}

fn entry_failure(entry: &BatchResultErrorEntry) -> EntryFailure {
    EntryFailure {
        id: entry.id().to_string(),
        code: entry.code().to_string(),
        message: entry.message().map(str::to_string),
        sender_fault: entry.sender_fault(),
    }
}
