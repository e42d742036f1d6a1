#![allow(dead_code)]

// Shared helpers for integration tests.
//
// Cookies are parsed/encoded with `tower_cookies::Cookie` to match what the middleware emits in
// `Set-Cookie` and what browsers send back in `Cookie`.
use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;
use tower_session_resolver::{
    CookieAttributes, MemoryStore, Record, RequestSession, SessionStore, store,
};

pub async fn body_string(body: Body) -> String {
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Basic handler used by many tests: write a single key into the session.
    let session = req
        .extensions()
        .get::<RequestSession>()
        .cloned()
        .expect("request includes RequestSession extension")
        .resolve()
        .await
        .expect("session resolves");

    session.insert("foo", 42).expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn read_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Resolve the session without writing to it; respond with its id.
    let session = req
        .extensions()
        .get::<RequestSession>()
        .cloned()
        .expect("request includes RequestSession extension")
        .resolve()
        .await
        .expect("session resolves");

    Ok(Response::new(Body::from(session.id().to_owned())))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::new(Body::empty()))
}

pub fn set_cookie_count(headers: &HeaderMap) -> usize {
    headers.get_all(header::SET_COOKIE).iter().count()
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    cookie.encoded().to_string()
}

/// A stored record whose last touch happened `touched_ago` before now.
pub fn record_touched(max_age: Duration, touched_ago: Duration) -> Record {
    let mut record = Record::new(CookieAttributes {
        path: "/".into(),
        http_only: true,
        domain: None,
        same_site: None,
        secure: false,
        max_age: Some(max_age.whole_seconds()),
        expires: Some(OffsetDateTime::now_utc() - touched_ago + max_age),
    });
    record.data.insert("user".into(), "alice".into());
    record
}

/// Memory store that counts calls per operation.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub gets: Arc<AtomicUsize>,
    pub sets: Arc<AtomicUsize>,
    pub destroys: Arc<AtomicUsize>,
    pub touches: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn touches(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        for counter in [&self.gets, &self.sets, &self.destroys, &self.touches] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn get(&self, id: &str) -> store::Result<Option<Record>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, record: &Record) -> store::Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(id, record).await
    }

    async fn destroy(&self, id: &str) -> store::Result<()> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.inner.destroy(id).await
    }

    async fn touch(&self, id: &str, record: &Record) -> store::Result<()> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        self.inner.touch(id, record).await
    }
}

/// Store whose every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, _id: &str) -> store::Result<Option<Record>> {
        Err(store::Error::Backend("store is down".into()))
    }

    async fn set(&self, _id: &str, _record: &Record) -> store::Result<()> {
        Err(store::Error::Backend("store is down".into()))
    }

    async fn destroy(&self, _id: &str) -> store::Result<()> {
        Err(store::Error::Backend("store is down".into()))
    }
}

/// Store returning a fixed JSON snapshot for every id, the way text-backed stores do.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pub snapshot: String,
}

#[async_trait]
impl SessionStore for SnapshotStore {
    async fn get(&self, _id: &str) -> store::Result<Option<Record>> {
        tower_session_resolver::format::decode_record(&self.snapshot).map(Some)
    }

    async fn set(&self, _id: &str, _record: &Record) -> store::Result<()> {
        Ok(())
    }

    async fn destroy(&self, _id: &str) -> store::Result<()> {
        Ok(())
    }
}
