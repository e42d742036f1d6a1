//! Store-backed sessions for `tower`, identified by a cookie.
//!
//! [`SessionManagerLayer`] puts a [`RequestSession`] into every request's extensions. The first
//! call to [`RequestSession::resolve`] (or the [`Session`] extractor) loads the record named by
//! the session cookie from a [`SessionStore`], or creates a new session when there is none.
//! Later calls within the same request return the same [`Session`] without touching the store.
//!
//! When the inner service has responded, modified sessions are committed and the layer decides
//! whether the client needs a `Set-Cookie`:
//!
//! - destroyed sessions get an expired cookie,
//! - touched sessions get a cookie with the refreshed expiry,
//! - new sessions get a cookie only once something was written to them.
//!
//! With [`SessionConfig::with_touch_after`], a loaded session is touched only when at least that
//! much time has passed since its last touch, so frequent requests don't each cost a store write.
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use time::Duration;
//! use tower_session_resolver::{MemoryStore, Session, SessionConfig, SessionManagerLayer};
//!
//! async fn index(session: Session) -> String {
//!     let n: usize = session.get("n").ok().flatten().unwrap_or(0);
//!     session.insert("n", n + 1).expect("counter serializes");
//!     format!("n={n}")
//! }
//!
//! let config = SessionConfig::default()
//!     .with_max_age(Duration::days(1))
//!     .with_touch_after(Duration::hours(1));
//! let layer = SessionManagerLayer::new(MemoryStore::new()).with_config(config);
//! let app: Router = Router::new().route("/", get(index)).layer(layer);
//! ```
//!
//! Outside of `tower`, drive a [`SessionResolver`] directly: build a [`RequestSession`] from the
//! id returned by [`CookieController::get`], resolve it, then call
//! [`RequestSession::finalize`] once before sending headers and emit the returned cookie, if any.

mod config;
mod controller;
#[cfg(feature = "axum-core")]
mod extract;
pub mod format;
mod id;
pub mod layer;
mod memory;
mod record;
mod resolver;
mod session;
pub mod store;

pub use tower_cookies::cookie::SameSite;

#[cfg(any(feature = "signed", feature = "private"))]
pub use tower_cookies::Key;

pub use crate::config::{DEFAULT_COOKIE_NAME, SessionConfig};
pub use crate::controller::{CookieController, PlaintextCookie};
pub use crate::id::{IdGenerator, generate_id};
pub use crate::layer::SessionManagerLayer;
pub use crate::memory::MemoryStore;
pub use crate::record::{CookieAttributes, Record};
pub use crate::resolver::{RequestSession, SessionResolver};
pub use crate::session::Session;
pub use crate::store::SessionStore;

#[cfg(feature = "signed")]
pub use crate::controller::SignedCookie;

#[cfg(feature = "private")]
pub use crate::controller::PrivateCookie;
