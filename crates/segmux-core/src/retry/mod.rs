//! Retry and backoff for chunk and stream fetches.
//!
//! Every fetch failure except cancellation is retried with a linear backoff;
//! callers get the last error once the policy gives up.

mod error;
mod policy;
mod run;

pub use error::ChunkError;
pub use policy::{RetryDecision, RetryPolicy};
pub use run::retry_with_backoff;
