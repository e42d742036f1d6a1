use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{
    config::SessionConfig,
    record::{COOKIE_KEY, CookieAttributes, Record},
    resolver::RequestState,
    store::{self, SessionStore},
};

/// Cookie expiry forced onto destroyed sessions so clients drop the cookie.
fn expired() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(1)
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    is_new: bool,
    is_touched: bool,
    is_destroyed: bool,
}

struct State {
    record: Record,
    flags: Flags,
    // Payload as last loaded from or written to the store.
    persisted: HashMap<String, Value>,
    // Whether the record exists in the store under this id.
    stored: bool,
}

struct Inner {
    id: String,
    now: OffsetDateTime,
    store: Arc<dyn SessionStore>,
    request: Weak<RequestState>,
    state: Mutex<State>,
}

/// A request-scoped handle over one session record.
///
/// Cloning is cheap and every clone refers to the same session. Payload reads and writes are
/// in-memory only; [`commit`](Self::commit), [`touch`](Self::touch) and
/// [`destroy`](Self::destroy) talk to the store.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub(crate) fn loaded(
        id: String,
        record: Record,
        now: OffsetDateTime,
        store: Arc<dyn SessionStore>,
        request: Weak<RequestState>,
    ) -> Self {
        let persisted = record.data.clone();
        Self::from_state(
            id,
            now,
            store,
            request,
            State {
                record,
                flags: Flags::default(),
                persisted,
                stored: true,
            },
        )
    }

    pub(crate) fn created(
        id: String,
        cookie: CookieAttributes,
        now: OffsetDateTime,
        store: Arc<dyn SessionStore>,
        request: Weak<RequestState>,
    ) -> Self {
        Self::from_state(
            id,
            now,
            store,
            request,
            State {
                record: Record::new(cookie),
                flags: Flags {
                    is_new: true,
                    ..Flags::default()
                },
                persisted: HashMap::new(),
                stored: false,
            },
        )
    }

    fn from_state(
        id: String,
        now: OffsetDateTime,
        store: Arc<dyn SessionStore>,
        request: Weak<RequestState>,
        state: State,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                now,
                store,
                request,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// `true` when no stored record matched this request's cookie.
    pub fn is_new(&self) -> bool {
        self.inner.state.lock().flags.is_new
    }

    pub fn is_touched(&self) -> bool {
        self.inner.state.lock().flags.is_touched
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().flags.is_destroyed
    }

    /// `true` when the payload differs from what was last loaded or committed.
    pub fn is_modified(&self) -> bool {
        let state = self.inner.state.lock();
        state.record.data != state.persisted
    }

    pub fn cookie(&self) -> CookieAttributes {
        self.inner.state.lock().record.cookie.clone()
    }

    pub fn expires(&self) -> Option<OffsetDateTime> {
        self.inner.state.lock().record.cookie.expires
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> store::Result<Option<T>> {
        self.get_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| store::Error::Decode(err.to_string()))
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().record.data.get(key).cloned()
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> store::Result<()> {
        let value =
            serde_json::to_value(value).map_err(|err| store::Error::Encode(err.to_string()))?;
        self.insert_value(key, value)?;
        Ok(())
    }

    /// Insert a raw value, returning the previous one. `"cookie"` is reserved.
    pub fn insert_value(&self, key: &str, value: Value) -> store::Result<Option<Value>> {
        if key == COOKIE_KEY {
            return Err(store::Error::Encode(format!(
                "`{COOKIE_KEY}` is a reserved session key"
            )));
        }

        Ok(self
            .inner
            .state
            .lock()
            .record
            .data
            .insert(key.to_owned(), value))
    }

    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> store::Result<Option<T>> {
        self.remove_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| store::Error::Decode(err.to_string()))
    }

    pub fn remove_value(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().record.data.remove(key)
    }

    /// Drop every application field. The cookie attributes are kept.
    pub fn clear(&self) {
        self.inner.state.lock().record.data.clear();
    }

    /// `true` when no application field is set.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().record.data.is_empty()
    }

    /// Refresh the expiry from `max_age` and extend the record in the store.
    pub async fn touch(&self) -> store::Result<()> {
        let record = {
            let mut state = self.inner.state.lock();
            state.record.cookie.refresh_expiry(self.inner.now);
            state.record.clone()
        };

        self.inner.store.touch(&self.inner.id, &record).await?;
        self.inner.state.lock().flags.is_touched = true;
        Ok(())
    }

    /// Write the current payload and cookie attributes to the store. Flags are unchanged.
    pub async fn commit(&self) -> store::Result<()> {
        let record = self.inner.state.lock().record.clone();
        self.inner.store.set(&self.inner.id, &record).await?;

        let mut state = self.inner.state.lock();
        state.persisted = record.data;
        state.stored = true;
        Ok(())
    }

    /// Delete the record and expire the client cookie.
    ///
    /// The session is detached from its request: resolving again within the same request
    /// yields a new session.
    pub async fn destroy(&self) -> store::Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.flags.is_destroyed = true;
            state.record.cookie.expires = Some(expired());
        }

        self.inner.store.destroy(&self.inner.id).await?;
        tracing::debug!(session.id = %self.inner.id, "session destroyed");

        if let Some(request) = self.inner.request.upgrade() {
            request.detach(self).await;
        }

        Ok(())
    }

    /// `true` when both handles refer to the same session instance.
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The `Set-Cookie` this session needs, if any.
    ///
    /// Only destroyed sessions, touched sessions and new sessions carrying data emit a cookie.
    /// A new session nobody wrote to stays invisible to the client. With `saved_only`, a new
    /// session that never reached the store gets no cookie either.
    pub(crate) fn set_cookie(
        &self,
        config: &SessionConfig,
        saved_only: bool,
    ) -> Option<Cookie<'static>> {
        let state = self.inner.state.lock();
        let Flags {
            is_new,
            is_touched,
            is_destroyed,
        } = state.flags;

        let populated = !state.record.data.is_empty();
        if !(is_destroyed || is_touched || (is_new && populated)) {
            return None;
        }

        if saved_only && is_new && !is_destroyed && !state.stored {
            return None;
        }

        Some(config.build_cookie(self.inner.id.clone(), &state.record.cookie))
    }

    /// Commit unless destroyed or unchanged since the last load/commit.
    pub(crate) async fn commit_if_modified(&self) -> store::Result<bool> {
        {
            let state = self.inner.state.lock();
            if state.flags.is_destroyed || state.record.data == state.persisted {
                return Ok(false);
            }
        }

        self.commit().await?;
        Ok(true)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("flags", &state.flags)
            .field("record", &state.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn session(store: &MemoryStore, max_age: Option<i64>) -> Session {
        let now = OffsetDateTime::now_utc();
        let config = match max_age {
            Some(seconds) => SessionConfig::default().with_max_age(Duration::seconds(seconds)),
            None => SessionConfig::default(),
        };
        Session::created(
            "abc".into(),
            config.default_attributes(now),
            now,
            Arc::new(store.clone()),
            Weak::new(),
        )
    }

    #[test]
    fn cookie_key_is_reserved() {
        let session = session(&MemoryStore::new(), None);
        assert!(matches!(
            session.insert("cookie", 1),
            Err(store::Error::Encode(_))
        ));
        assert!(session.is_empty());
    }

    #[test]
    fn typed_access() {
        let session = session(&MemoryStore::new(), None);
        session.insert("n", 41).expect("insert succeeds");

        assert_eq!(session.get::<u32>("n").expect("get succeeds"), Some(41));
        assert!(session.get::<String>("n").is_err());
        assert_eq!(session.get::<u32>("missing").expect("get succeeds"), None);
        assert_eq!(session.remove::<u32>("n").expect("remove succeeds"), Some(41));
        assert!(session.is_empty());
    }

    #[test]
    fn new_session_emits_only_when_populated() {
        let config = SessionConfig::default();
        let session = session(&MemoryStore::new(), None);
        assert!(session.set_cookie(&config, false).is_none());

        session.insert("n", 1).expect("insert succeeds");
        let cookie = session.set_cookie(&config, false).expect("cookie is emitted");
        assert_eq!(cookie.value(), "abc");
    }

    #[tokio::test]
    async fn saved_only_requires_a_stored_record() {
        let config = SessionConfig::default();
        let store = MemoryStore::new();
        let destroyed = session(&store, None);
        destroyed.destroy().await.expect("destroy succeeds");
        assert!(destroyed.set_cookie(&config, true).is_some());

        let session = session(&store, None);
        session.insert("n", 1).expect("insert succeeds");
        assert!(session.set_cookie(&config, true).is_none());

        session.commit().await.expect("commit succeeds");
        assert!(session.set_cookie(&config, true).is_some());
    }

    #[tokio::test]
    async fn commit_keeps_flags_and_tracks_modification() {
        let store = MemoryStore::new();
        let session = session(&store, Some(60));
        session.insert("n", 1).expect("insert succeeds");
        assert!(session.is_modified());

        session.commit().await.expect("commit succeeds");
        assert!(session.is_new());
        assert!(!session.is_modified());
        assert!(!session.commit_if_modified().await.expect("commit succeeds"));

        let stored = store.get("abc").await.expect("get succeeds").expect("record");
        assert_eq!(stored.data["n"], 1);
        assert_eq!(stored.cookie.max_age, Some(60));
    }

    #[tokio::test]
    async fn touch_without_max_age_keeps_expiry() {
        let session = session(&MemoryStore::new(), None);
        session.touch().await.expect("touch succeeds");

        assert!(session.is_touched());
        assert_eq!(session.expires(), None);
    }

    #[tokio::test]
    async fn destroy_expires_cookie() {
        let store = MemoryStore::new();
        let session = session(&store, Some(60));
        session.insert("n", 1).expect("insert succeeds");
        session.commit().await.expect("commit succeeds");

        session.destroy().await.expect("destroy succeeds");

        assert!(session.is_destroyed());
        assert!(store.is_empty());
        assert_eq!(session.expires(), Some(expired()));
        assert!(!session.commit_if_modified().await.expect("commit succeeds"));
        assert!(store.is_empty());
    }
}
