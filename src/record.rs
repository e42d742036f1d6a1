use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::{SameSite, format};

/// Key under which a [`Record`] keeps its cookie attributes.
pub const COOKIE_KEY: &str = "cookie";

/// Cookie attributes persisted alongside every session record.
///
/// `max_age` (seconds) and `expires` are set together: `expires` is derived as
/// `now + max_age` whenever a session is created or touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieAttributes {
    pub path: String,
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "format::same_site"
    )]
    pub same_site: Option<SameSite>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "format::timestamp"
    )]
    pub expires: Option<OffsetDateTime>,
}

impl CookieAttributes {
    /// The configured lifetime, if any.
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age.map(Duration::seconds)
    }

    /// Recompute `expires` from `max_age` relative to `now`.
    ///
    /// No-op without a `max_age`, or when `now + max_age` is not a representable date.
    pub(crate) fn refresh_expiry(&mut self, now: OffsetDateTime) {
        match self.max_age().map(|max_age| now.checked_add(max_age)) {
            Some(Some(expires)) => self.expires = Some(expires),
            Some(None) => {
                tracing::warn!(max_age = ?self.max_age, "max age out of range, keeping expiry");
            }
            None => {}
        }
    }

    /// When the record was last created or touched, derived from `expires - max_age`.
    ///
    /// `None` without `expires` or when the subtraction leaves the representable range.
    pub(crate) fn last_touched_at(&self) -> Option<OffsetDateTime> {
        let max_age = self.max_age().unwrap_or(Duration::ZERO);
        self.expires?.checked_sub(max_age)
    }
}

/// The persisted unit: application payload plus the mandatory cookie attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub cookie: CookieAttributes,
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

impl Record {
    pub fn new(cookie: CookieAttributes) -> Self {
        Self {
            cookie,
            data: HashMap::new(),
        }
    }
}
