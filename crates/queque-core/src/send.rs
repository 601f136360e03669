use serde::Serialize;

use crate::backend::QueueBackend;
use crate::client::Client;
use crate::config::MAX_BATCH_SIZE;
use crate::error::{Error, ProduceError};
use crate::message::SendEntry;

impl<B: QueueBackend> Client<B> {
    /// Encodes `payloads` as JSON and sends them to the queue.
    ///
    /// Payloads go out in batches of at most 10. Every batch is attempted even
    /// if an earlier one fails; the failures come back together as
    /// [`Error::Produce`]. An encoding failure aborts before anything is sent.
    pub async fn produce<T: Serialize>(&self, payloads: &[T]) -> Result<(), Error> {
        let queue = self.ensure_connection().await?;

        // SQS doesn't allow empty batch requests
        if payloads.is_empty() {
            return Ok(());
        }

        let entries = payloads
            .iter()
            .map(|payload| -> Result<SendEntry, Error> {
                Ok(SendEntry {
                    id: uuid::Uuid::new_v4().to_string(),
                    body: serde_json::to_string(payload).map_err(Error::Encode)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut errors = ProduceError::default();
        for chunk in entries.chunks(MAX_BATCH_SIZE as usize) {
            match self.backend.send_batch(queue, chunk.to_vec()).await {
                Ok(failures) => errors.entries.extend(failures),
                Err(err) => {
                    log::warn!("failed to send {} messages: {err}", chunk.len());
                    errors.calls.push(err);
                }
            }
        }

        if errors.calls.is_empty() && errors.entries.is_empty() {
            log::debug!("sent {} messages to {queue}", entries.len());
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}
