//! The queue client and its lazily resolved connection.

use tokio::sync::OnceCell;

use crate::backend::QueueBackend;
use crate::config::{Config, RetryPolicy};
use crate::error::Error;
use crate::message::QueueUrl;
use crate::sqs::SqsBackend;

/// Client producing to and consuming from one queue.
///
/// The queue URL is resolved on first use (or by [`Client::connect`]) and
/// cached for the lifetime of the client. The client is `Sync`; share it
/// behind an `Arc` to produce and consume from several tasks.
///
/// # Example
///
/// ```no_run
/// use queque::{Client, Config};
///
/// # async fn example() -> Result<(), queque::Error> {
/// let client = Client::new(Config::new("orders")).await;
/// client.connect().await?;
/// client.produce(&[serde_json::json!({ "info": "1" })]).await?;
/// # Ok(())
/// # }
/// ```
pub struct Client<B = SqsBackend> {
    pub(crate) backend: B,
    pub(crate) config: Config,
    pub(crate) retry: RetryPolicy,
    queue_url: OnceCell<QueueUrl>,
}

impl Client<SqsBackend> {
    /// Creates an SQS client, loading AWS configuration from `config` and the environment.
    pub async fn new(config: Config) -> Self {
        let sdk_config = config.load_sdk_config().await;
        Self::with_backend(SqsBackend::from_config(&sdk_config), config)
    }
}

impl<B: QueueBackend> Client<B> {
    /// Creates a client over any [`QueueBackend`].
    ///
    /// Nothing is sent to the backend until the first operation or
    /// [`Client::connect`]. The retry policy is taken from `config` once, here.
    ///
    /// # Arguments
    ///
    /// * `backend` - The queue service to talk to
    /// * `config` - Queue name, receive parameters and retry policy
    ///
    /// # Example
    ///
    /// ```no_run
    /// use queque::{Client, Config, SqsBackend};
    ///
    /// # async fn example() {
    /// let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    /// let client = Client::with_backend(SqsBackend::from_config(&sdk_config), Config::new("orders"));
    /// # }
    /// ```
    pub fn with_backend(backend: B, config: Config) -> Self {
        let retry = config.retry_policy();
        Self {
            backend,
            config,
            retry,
            queue_url: OnceCell::new(),
        }
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying backend, e.g. to reach the raw SDK client.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Queue URL, if already resolved.
    pub fn queue_url(&self) -> Option<&QueueUrl> {
        self.queue_url.get()
    }

    /// Resolves the queue URL now instead of on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the queue cannot be created or
    /// resolved. A later call tries again.
    pub async fn connect(&self) -> Result<&QueueUrl, Error> {
        self.ensure_connection().await
    }

    /// Returns the queue URL, creating or resolving the queue if this is the first use.
    ///
    /// Concurrent first callers share a single create call. A failed call
    /// leaves the URL unset so the next caller retries.
    pub(crate) async fn ensure_connection(&self) -> Result<&QueueUrl, Error> {
        self.queue_url
            .get_or_try_init(|| async {
                let queue = &self.config.queue_name;
                let url = self
                    .backend
                    .create_queue(queue)
                    .await
                    .map_err(|source| Error::Connection {
                        queue: queue.clone(),
                        source,
                    })?;
                log::debug!("resolved queue {queue} to {url}");
                Ok(url)
            })
            .await
    }
}
