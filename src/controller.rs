use std::fmt::Debug;

use tower_cookies::{Cookie, Cookies};

/// The sign/unsign seam between the session id and the cookie jar.
///
/// Implementors only map raw cookie values to verified ids and back. An `unsign` failure must
/// yield `None` so a forged or corrupted id degrades to a fresh session.
pub trait CookieController: Debug + Clone + Send + Sync + 'static {
    /// The verified value of cookie `name`, or `None` when it is absent or fails verification.
    fn unsign(&self, cookies: &Cookies, name: &str) -> Option<String>;

    /// Put the outgoing session cookie into the jar, signing or encrypting its value.
    fn sign(&self, cookies: &Cookies, cookie: Cookie<'static>);

    /// The session id the client presented, if any.
    ///
    /// Empty values count as no id. A cookie that is present but fails verification is logged.
    fn get(&self, cookies: &Cookies, name: &str) -> Option<String> {
        match self.unsign(cookies, name) {
            Some(id) if id.is_empty() => None,
            Some(id) => Some(id),
            None => {
                if cookies.get(name).is_some() {
                    tracing::warn!(cookie.name = name, "session cookie failed verification");
                }
                None
            }
        }
    }
}

/// Session id carried as-is. The id is unguessable but not tamper-evident.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCookie;

impl CookieController for PlaintextCookie {
    fn unsign(&self, cookies: &Cookies, name: &str) -> Option<String> {
        cookies.get(name).map(|cookie| cookie.value().to_owned())
    }

    fn sign(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        cookies.add(cookie);
    }
}

/// Session id followed by an HMAC of the cookie. Tampered values are rejected.
#[cfg(feature = "signed")]
#[derive(Debug, Clone)]
pub struct SignedCookie(crate::Key);

#[cfg(feature = "signed")]
impl SignedCookie {
    pub fn new(key: crate::Key) -> Self {
        Self(key)
    }
}

#[cfg(feature = "signed")]
impl CookieController for SignedCookie {
    fn unsign(&self, cookies: &Cookies, name: &str) -> Option<String> {
        let jar = cookies.signed(&self.0);
        jar.get(name).map(|cookie| cookie.value().to_owned())
    }

    fn sign(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        cookies.signed(&self.0).add(cookie);
    }
}

/// Session id encrypted and authenticated, hiding it from the client.
#[cfg(feature = "private")]
#[derive(Debug, Clone)]
pub struct PrivateCookie(crate::Key);

#[cfg(feature = "private")]
impl PrivateCookie {
    pub fn new(key: crate::Key) -> Self {
        Self(key)
    }
}

#[cfg(feature = "private")]
impl CookieController for PrivateCookie {
    fn unsign(&self, cookies: &Cookies, name: &str) -> Option<String> {
        let jar = cookies.private(&self.0);
        jar.get(name).map(|cookie| cookie.value().to_owned())
    }

    fn sign(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        cookies.private(&self.0).add(cookie);
    }
}
