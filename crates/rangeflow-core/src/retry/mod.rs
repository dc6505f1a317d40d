//! Retry and backoff policy.
//!
//! Classifies fetch failures (throttling, gateway errors, broken bodies,
//! transport failures) and turns them into backoff decisions for the first
//! chunk of a download. Later chunks use the fixed overload delay instead.

mod classify;
mod policy;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
