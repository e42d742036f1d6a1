use std::borrow::Cow;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{SameSite, record::CookieAttributes};

pub const DEFAULT_COOKIE_NAME: &str = "sid";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) same_site: Option<SameSite>,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) max_age: Option<Duration>,
    pub(crate) touch_after: Option<Duration>,
    pub(crate) auto_commit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            http_only: true,
            same_site: None,
            secure: false,
            path: "/".into(),
            domain: None,
            max_age: None,
            touch_after: None,
            auto_commit: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn without_same_site(mut self) -> Self {
        self.same_site = None;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Lifetime of new sessions. Whole seconds are kept.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn without_max_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    /// Minimum time since the last touch before a loaded session is touched automatically.
    ///
    /// A negative duration disables automatic touching, the same as [`Self::without_touch_after`].
    #[must_use]
    pub fn with_touch_after(mut self, touch_after: Duration) -> Self {
        self.touch_after = (!touch_after.is_negative()).then_some(touch_after);
        self
    }

    #[must_use]
    pub fn without_touch_after(mut self) -> Self {
        self.touch_after = None;
        self
    }

    /// Persist modified sessions after the inner service responds. Defaults to `true`.
    #[must_use]
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn default_attributes(&self, now: OffsetDateTime) -> CookieAttributes {
        let mut cookie = CookieAttributes {
            path: self.path.to_string(),
            http_only: self.http_only,
            domain: self.domain.as_ref().map(|domain| domain.to_string()),
            same_site: self.same_site,
            secure: self.secure,
            max_age: self.max_age.map(|max_age| max_age.whole_seconds()),
            expires: None,
        };
        cookie.refresh_expiry(now);
        cookie
    }

    pub(crate) fn build_cookie(&self, id: String, attributes: &CookieAttributes) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), id))
            .http_only(attributes.http_only)
            .secure(attributes.secure)
            .path(attributes.path.clone());

        if let Some(same_site) = attributes.same_site {
            cookie_builder = cookie_builder.same_site(same_site);
        }

        if let Some(domain) = attributes.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        if let Some(expires) = attributes.expires {
            cookie_builder = cookie_builder.expires(expires);
        }

        cookie_builder.build()
    }
}
