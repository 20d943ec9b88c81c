//! Session module: the authenticated identity used for every request
//!
//! # Components
//!
//! - `SessionManager`: login, login check, navigation and cookie persistence
//! - `SessionState`: cookie jar plus the `Referer` tracking the last page
//! - `SessionPhase`: where the manager is in its authentication lifecycle
//! - `Page`: a fully-read response handed back to callers

mod cookies;
mod manager;

pub use cookies::{load_jar, save_jar, CookieJar};
pub use manager::SessionManager;

use reqwest::StatusCode;
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// Platform endpoints used by the session and the crawl collaborators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub main_url: String,
    pub login_url: String,
    pub login_api_url: String,

    /// Item detail page prefix, the id is appended
    pub illust_url: String,

    /// Related-items feed, `{id}` is replaced by the item id
    pub recommend_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            main_url: "https://www.pixiv.net".to_string(),
            login_url: "https://accounts.pixiv.net/login?lang=zh&source=pc&view_type=page&ref=wwwtop_accounts_index".to_string(),
            login_api_url: "https://accounts.pixiv.net/api/login?lang=zh".to_string(),
            illust_url: "https://www.pixiv.net/member_illust.php?mode=medium&illust_id=".to_string(),
            recommend_url: "https://www.pixiv.net/ajax/illust/{id}/recommend/init?limit=1".to_string(),
        }
    }
}

impl Endpoints {
    /// Returns every endpoint rebased onto `base` (used against mock servers)
    pub fn rebased(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            main_url: base.to_string(),
            login_url: format!("{}/login", base),
            login_api_url: format!("{}/api/login", base),
            illust_url: format!("{}/member_illust.php?mode=medium&illust_id=", base),
            recommend_url: format!("{}/ajax/illust/{{id}}/recommend/init?limit=1", base),
        }
    }

    pub fn item_url(&self, id: &crate::item::ItemId) -> String {
        format!("{}{}", self.illust_url, id)
    }

    pub fn related_url(&self, id: &crate::item::ItemId) -> String {
        self.recommend_url.replace("{id}", id.as_str())
    }
}

/// Bounded retry with exponential backoff for transient transport failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Authentication lifecycle of a session
///
/// `Uninitialized -> (Loaded | Fresh) -> [LoginCheck] -> Authenticated | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    /// Cookies restored from the store, not yet verified
    Loaded,
    /// No cookie store, starting from scratch
    Fresh,
    LoginCheck,
    Authenticated,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Fresh => "fresh",
            Self::LoginCheck => "login_check",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Transport identity owned by the session manager
#[derive(Debug, Clone)]
pub struct SessionState {
    pub cookies: CookieJar,
    pub referer: String,
    pub phase: SessionPhase,
}

impl SessionState {
    pub fn new(initial_referer: impl Into<String>) -> Self {
        Self {
            cookies: CookieJar::new(),
            referer: initial_referer.into(),
            phase: SessionPhase::Uninitialized,
        }
    }
}

/// A response whose body has been read completely
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Page {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = Endpoints::rebased("http://127.0.0.1:9000/");
        let id = ItemId::from("42");

        assert_eq!(endpoints.main_url, "http://127.0.0.1:9000");
        assert_eq!(
            endpoints.item_url(&id),
            "http://127.0.0.1:9000/member_illust.php?mode=medium&illust_id=42"
        );
        assert_eq!(
            endpoints.related_url(&id),
            "http://127.0.0.1:9000/ajax/illust/42/recommend/init?limit=1"
        );
    }

    #[test]
    fn test_terminal_phases() {
        assert!(SessionPhase::Authenticated.is_terminal());
        assert!(SessionPhase::Failed.is_terminal());
        assert!(!SessionPhase::LoginCheck.is_terminal());
    }
}
