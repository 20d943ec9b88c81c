//! Cookie jar and its on-disk store
//!
//! The jar is a flat name -> value map fed from `Set-Cookie` response headers
//! and rendered back into a single `Cookie` request header. The store file is
//! an opaque JSON blob owned by the session.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Copies every cookie of `other` into this jar, overwriting duplicates
    pub fn merge(&mut self, other: CookieJar) {
        self.cookies.extend(other.cookies);
    }

    /// Merges one `Set-Cookie` header value into the jar
    ///
    /// Only the leading `name=value` pair is kept; attributes are ignored. An
    /// empty value removes the cookie, which is how servers expire them.
    pub fn absorb(&mut self, set_cookie: &str) {
        let first = set_cookie.split(';').next().unwrap_or("").trim();
        let Some((name, value)) = first.split_once('=') else {
            return;
        };

        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return;
        }

        if value.is_empty() {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.to_string());
        }
    }

    /// Merges every `Set-Cookie` header of a response
    pub fn absorb_headers(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(value) = value.to_str() {
                self.absorb(value);
            }
        }
    }

    /// Renders the jar as a `Cookie` request header value
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// What is written to the cookie store path
#[derive(Debug, Serialize, Deserialize)]
struct CookieStore {
    saved_at: DateTime<Utc>,
    jar: CookieJar,
}

/// Writes the jar to `path`, creating parent directories as needed
pub fn save_jar(jar: &CookieJar, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let store = CookieStore {
        saved_at: Utc::now(),
        jar: jar.clone(),
    };
    std::fs::write(path, serde_json::to_vec_pretty(&store)?)?;
    Ok(())
}

/// Reads a jar previously written by [`save_jar`]
pub fn load_jar(path: &Path) -> crate::Result<CookieJar> {
    let content = std::fs::read(path)?;
    let store: CookieStore = serde_json::from_slice(&content)?;

    let age = Utc::now() - store.saved_at;
    tracing::debug!(
        "Cookie store {} is {} hours old",
        path.display(),
        age.num_hours()
    );

    Ok(store.jar)
}
