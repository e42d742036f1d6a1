//! The persistence contract for session records.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::record::Record;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Backend failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Persists session records keyed by session id.
///
/// Implementations must tolerate concurrent calls for different ids. Concurrent writes for the
/// same id race and the last write wins.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync + 'static {
    /// Look up a record. A missing id is `Ok(None)`, never an error.
    async fn get(&self, id: &str) -> Result<Option<Record>>;

    /// Insert or fully replace the record for `id`.
    async fn set(&self, id: &str, record: &Record) -> Result<()>;

    /// Remove the record for `id`. Removing a missing id is not an error.
    async fn destroy(&self, id: &str) -> Result<()>;

    /// Extend the liveness of `id` without changing its payload.
    ///
    /// Optional: the default does nothing, so stores without their own expiry bookkeeping only
    /// see the refreshed `expires` on the next `set`.
    async fn touch(&self, _id: &str, _record: &Record) -> Result<()> {
        Ok(())
    }
}
