use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::{
    format,
    record::Record,
    store::{self, SessionStore},
};

/// Process-local store keeping a JSON snapshot of every record.
///
/// Records are serialized on write and decoded on read, so later mutation of a live
/// [`Session`](crate::Session) never leaks into the store. Not shared across processes and lost
/// on restart: use it for development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included until they are next read.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> store::Result<Option<Record>> {
        // Held until the expiry check is done so a concurrent `set` is never removed.
        let mut sessions = self.sessions.lock();
        let Some(snapshot) = sessions.get(id) else {
            return Ok(None);
        };

        let record = format::decode_record(snapshot)?;
        if record
            .cookie
            .expires
            .is_some_and(|expires| expires <= OffsetDateTime::now_utc())
        {
            sessions.remove(id);
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn set(&self, id: &str, record: &Record) -> store::Result<()> {
        let snapshot = format::encode_record(record)?;
        self.sessions.lock().insert(id.to_owned(), snapshot);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> store::Result<()> {
        self.sessions.lock().remove(id);
        Ok(())
    }

    async fn touch(&self, id: &str, record: &Record) -> store::Result<()> {
        self.set(id, record).await
    }
}
