use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{
    config::SessionConfig,
    id::{IdGenerator, generate_id},
    record::CookieAttributes,
    session::Session,
    store::{self, SessionStore},
};

/// Loads or creates sessions for requests.
///
/// Cheap to clone. Use [`SessionResolver::request`] once per request to get the
/// request-scoped [`RequestSession`].
#[derive(Clone)]
pub struct SessionResolver {
    config: Arc<SessionConfig>,
    store: Arc<dyn SessionStore>,
    gen_id: IdGenerator,
}

impl SessionResolver {
    pub fn new<S: SessionStore>(config: SessionConfig, store: S) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            gen_id: Arc::new(generate_id),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    #[must_use]
    pub fn with_id_generator<F>(mut self, gen_id: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.gen_id = Arc::new(gen_id);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a request. `candidate` is the session id already checked by a
    /// [`CookieController`](crate::CookieController), if any.
    pub fn request(&self, candidate: Option<String>) -> RequestSession {
        RequestSession {
            resolver: self.clone(),
            state: Arc::new(RequestState {
                candidate,
                current: tokio::sync::Mutex::new(None),
                resolved: parking_lot::Mutex::new(Vec::new()),
                finalized: AtomicBool::new(false),
            }),
        }
    }

    async fn load_or_create(&self, request: &Arc<RequestState>) -> store::Result<Session> {
        let now = OffsetDateTime::now_utc();

        if let Some(id) = request.candidate.as_deref() {
            if let Some(record) = self.store.get(id).await? {
                let due = touch_due(&record.cookie, now, self.config.touch_after);
                let session = Session::loaded(
                    id.to_owned(),
                    record,
                    now,
                    self.store.clone(),
                    Arc::downgrade(request),
                );

                if due {
                    tracing::debug!(session.id = %id, "touching session");
                    session.touch().await?;
                }

                return Ok(session);
            }

            tracing::debug!("no stored session matches cookie");
        }

        let id = (self.gen_id)();
        tracing::debug!(session.id = %id, "new session");

        Ok(Session::created(
            id,
            self.config.default_attributes(now),
            now,
            self.store.clone(),
            Arc::downgrade(request),
        ))
    }
}

impl fmt::Debug for SessionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResolver")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Whether a loaded session is due for an automatic touch.
///
/// The last touch is derived as `expires - max_age`. A record stored with a different `max_age`
/// than the current config still uses its own `max_age`. A last touch in the future, or one that
/// cannot be represented, never counts as due.
pub(crate) fn touch_due(
    cookie: &CookieAttributes,
    now: OffsetDateTime,
    touch_after: Option<Duration>,
) -> bool {
    let Some(touch_after) = touch_after else {
        return false;
    };

    cookie
        .last_touched_at()
        .is_some_and(|last_touched| now - last_touched >= touch_after)
}

#[derive(Debug)]
pub(crate) struct RequestState {
    candidate: Option<String>,
    current: tokio::sync::Mutex<Option<Session>>,
    resolved: parking_lot::Mutex<Vec<Session>>,
    finalized: AtomicBool,
}

impl RequestState {
    /// Forget `session` as the request's current session.
    pub(crate) async fn detach(&self, session: &Session) {
        let mut current = self.current.lock().await;
        if current
            .as_ref()
            .is_some_and(|existing| existing.ptr_eq(session))
        {
            *current = None;
        }
    }
}

/// Session state for a single request.
///
/// Inserted into request extensions by [`SessionManagerLayer`](crate::SessionManagerLayer).
/// Resolution is lazy: the store is consulted on the first [`resolve`](Self::resolve) only.
#[derive(Debug, Clone)]
pub struct RequestSession {
    resolver: SessionResolver,
    state: Arc<RequestState>,
}

impl RequestSession {
    /// The request's session, loading or creating it on first use.
    ///
    /// Store failures are returned as-is; no session is produced in that case.
    pub async fn resolve(&self) -> store::Result<Session> {
        let mut current = self.state.current.lock().await;
        if let Some(session) = current.as_ref() {
            return Ok(session.clone());
        }

        let session = self.resolver.load_or_create(&self.state).await?;
        *current = Some(session.clone());
        self.state.resolved.lock().push(session.clone());

        Ok(session)
    }

    /// Commit every resolved session whose payload changed.
    pub async fn persist(&self) -> store::Result<()> {
        let sessions = self.state.resolved.lock().clone();
        for session in sessions {
            if session.commit_if_modified().await? {
                tracing::debug!(session.id = %session.id(), "session committed");
            }
        }
        Ok(())
    }

    /// Decide the outgoing session cookie. Call once, right before headers are sent.
    ///
    /// Returns `None` when no resolved session needs a cookie, and on every call after the
    /// first. When several sessions were resolved (a destroy followed by a new session), the
    /// last one that needs a cookie wins.
    pub fn finalize(&self) -> Option<Cookie<'static>> {
        self.finalize_with(false)
    }

    /// Like [`finalize`](Self::finalize), for responses that failed before sessions were saved.
    ///
    /// New sessions that never reached the store get no cookie, so the client is not handed an
    /// id that names nothing. Destroyed and touched sessions are unaffected.
    pub fn finalize_saved(&self) -> Option<Cookie<'static>> {
        self.finalize_with(true)
    }

    fn finalize_with(&self, saved_only: bool) -> Option<Cookie<'static>> {
        if self.state.finalized.swap(true, Ordering::AcqRel) {
            return None;
        }

        let config = self.resolver.config();
        self.state
            .resolved
            .lock()
            .iter()
            .rev()
            .find_map(|session| session.set_cookie(config, saved_only))
    }

    pub fn is_finalized(&self) -> bool {
        self.state.finalized.load(Ordering::Acquire)
    }
}
