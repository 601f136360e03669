use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::message::{Meta, Verdict};

/// Processes one decoded message and decides its fate.
///
/// Called concurrently for every message of a batch. `cancel` is the token
/// the caller passed to `consume`; long-running handlers should watch it.
/// Returning an error leaves the message in flight.
///
/// Async closures taking `(CancellationToken, T, Meta)` implement this trait:
///
/// ```no_run
/// use queque::{CancellationToken, HandlerError, Meta, Verdict};
///
/// let handler = |_cancel: CancellationToken, payload: serde_json::Value, meta: Meta| async move {
///     println!("attempt {}: {payload}", meta.attempt_count);
///     Ok::<_, HandlerError>(Verdict::Acknowledge)
/// };
/// ```
#[async_trait]
pub trait Handler<T: Send + 'static>: Send + Sync {
    async fn handle(
        &self,
        cancel: CancellationToken,
        payload: T,
        meta: Meta,
    ) -> Result<Verdict, HandlerError>;
}

#[async_trait]
impl<T, F, Fut> Handler<T> for F
where
    T: Send + 'static,
    F: Fn(CancellationToken, T, Meta) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Verdict, HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        cancel: CancellationToken,
        payload: T,
        meta: Meta,
    ) -> Result<Verdict, HandlerError> {
        (self)(cancel, payload, meta).await
    }
}
