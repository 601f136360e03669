//! Retry policy: turning a handler verdict into a backend action.

use crate::config::RetryPolicy;
use crate::message::{Outcome, Verdict};

/// Decides what to tell the backend about a successfully handled message.
///
/// A deferred message is requeued after `retry_timestep * attempt_count`
/// until its attempt count exceeds `max_retry_count`, then it is dropped by
/// acknowledging it. A message therefore gets `max_retry_count + 1` attempts.
pub fn classify(verdict: Verdict, attempt_count: u32, policy: &RetryPolicy) -> Outcome {
    match verdict {
        Verdict::Acknowledge => Outcome::Acknowledge,
        Verdict::Reject => Outcome::RequeueNow,
        Verdict::Defer if attempt_count > policy.max_retry_count => Outcome::Acknowledge,
        Verdict::Defer => Outcome::RequeueAfter(
            policy
                .retry_timestep
                .checked_mul(attempt_count)
                .unwrap_or(std::time::Duration::MAX),
        ),
    }
}
