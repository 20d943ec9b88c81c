//! Session manager implementation
//!
//! This module owns the one authenticated identity used by every request:
//! - Building the HTTP client with the configured user agent
//! - Restoring cookies from disk and verifying the login status
//! - Logging in with credentials when the stored session is missing or stale
//! - Tracking the `Referer` of the last successfully visited page
//! - Retrying transient transport failures with exponential backoff

use crate::config::{AccountConfig, Config, NetworkConfig};
use crate::session::{
    load_jar, save_jar, Endpoints, Page, RetryPolicy, SessionPhase, SessionState,
};
use crate::{CrawlError, Result};
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, RequestBuilder};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Reply of the login API
#[derive(Debug, Deserialize)]
struct LoginReply {
    error: bool,
    #[serde(default)]
    message: serde_json::Value,
}

/// Builds an HTTP client with the configured identity and timeouts
pub fn build_http_client(config: &NetworkConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Owns authentication state and issues every request on its behalf
///
/// All methods take `&self`; the cookie jar and `Referer` live behind a
/// mutex that is never held across an await point.
pub struct SessionManager {
    client: Client,
    endpoints: Endpoints,
    account: AccountConfig,
    cookies_path: PathBuf,
    retry: RetryPolicy,
    state: Mutex<SessionState>,
}

impl SessionManager {
    /// Creates a session manager from the loaded configuration
    ///
    /// The session starts `Uninitialized` with the login page as `Referer`;
    /// nothing is sent until [`SessionManager::restore_or_login`] is called.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies credentials, cookie store path, endpoints and
    ///   network settings
    ///
    /// # Returns
    ///
    /// * `Ok(SessionManager)` - Ready to authenticate
    /// * `Err(CrawlError::Transport)` - The HTTP client could not be built
    pub fn new(config: &Config) -> Result<Self> {
        let client =
            build_http_client(&config.network).map_err(|source| CrawlError::Transport {
                url: config.endpoints.main_url.clone(),
                source,
            })?;

        Ok(Self::with_client(
            client,
            config.endpoints.clone(),
            config.pixiv.clone(),
            config.system.cookies_path.clone(),
            config.retry_policy(),
        ))
    }

    pub fn with_client(
        client: Client,
        endpoints: Endpoints,
        account: AccountConfig,
        cookies_path: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        let state = SessionState::new(endpoints.login_url.clone());
        Self {
            client,
            endpoints,
            account,
            cookies_path,
            retry,
            state: Mutex::new(state),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    /// The `Referer` sent with the next request
    pub fn referer(&self) -> String {
        self.state().referer.clone()
    }

    /// Value of a session cookie, if set
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.state().cookies.get(name).map(str::to_string)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.state();
        tracing::debug!("Session phase {} -> {}", state.phase, phase);
        state.phase = phase;
    }

    /// Restores the stored session or logs in with the configured credentials
    ///
    /// On success the session is `Authenticated`. Any error leaves it `Failed`;
    /// nothing here is retried beyond the transport-level retry policy.
    pub async fn restore_or_login(&self) -> Result<()> {
        let result = self.authenticate().await;
        match &result {
            Ok(()) => self.set_phase(SessionPhase::Authenticated),
            Err(e) => {
                tracing::error!("Session could not be established: {}", e);
                self.set_phase(SessionPhase::Failed);
            }
        }
        result
    }

    async fn authenticate(&self) -> Result<()> {
        if self.cookies_path.exists() {
            tracing::info!(
                "Cookie store found at {}, trying to restore the session",
                self.cookies_path.display()
            );

            match self.load_cookies() {
                Ok(()) => {
                    self.set_phase(SessionPhase::Loaded);
                    self.set_phase(SessionPhase::LoginCheck);
                    if self.check_logged_in().await? {
                        return Ok(());
                    }
                    tracing::info!("Stored cookies are no longer valid, logging in again");
                }
                Err(e) => {
                    tracing::warn!("Cookie store is unreadable ({}), starting fresh", e);
                    self.start_fresh().await?;
                }
            }
        } else {
            tracing::info!("No cookie store, logging in for the first time");
            self.start_fresh().await?;
        }

        self.login_with_credentials(&self.account.username, &self.account.password)
            .await
    }

    /// Visits the main page unauthenticated to pick up baseline cookies
    async fn start_fresh(&self) -> Result<()> {
        self.set_phase(SessionPhase::Fresh);
        self.get(&self.endpoints.main_url).await?;
        Ok(())
    }

    /// Submits credentials with the one-time form token of the login page
    ///
    /// A rejected login is an [`CrawlError::Auth`]; transport problems surface
    /// as [`CrawlError::Transport`] so the two can be told apart.
    pub async fn login_with_credentials(&self, username: &str, password: &str) -> Result<()> {
        tracing::info!("Logging in as {}", username);

        let login_page = self.get(&self.endpoints.login_url).await?;
        let post_key = extract_post_key(&login_page.text())
            .ok_or_else(|| CrawlError::parse("login page", "no post_key form token found"))?;

        let form = [
            ("pixiv_id", username),
            ("password", password),
            ("post_key", post_key.as_str()),
            ("source", "pc"),
            ("return_to", self.endpoints.main_url.as_str()),
        ];
        let reply = self.post_form(&self.endpoints.login_api_url, &form).await?;
        let reply: LoginReply = serde_json::from_slice(&reply.body)?;

        if reply.error {
            tracing::error!("Login rejected for {}: {}", username, reply.message);
            return Err(CrawlError::Auth(format!(
                "login rejected for {}: {}",
                username, reply.message
            )));
        }
        tracing::info!("Login successful");

        self.navigate(&self.endpoints.main_url).await?;
        self.persist_cookies()?;
        Ok(())
    }

    /// Asks the main page whether the current cookies are logged in
    ///
    /// A page without the status marker counts as logged out.
    pub async fn check_logged_in(&self) -> Result<bool> {
        let page = self.get(&self.endpoints.main_url).await?;

        let logged_in = match login_marker(&page.text()) {
            Some(status) => status == "yes",
            None => {
                tracing::warn!("Main page carries no login status marker");
                false
            }
        };

        tracing::info!(logged_in, "Login status checked");
        Ok(logged_in)
    }

    /// GETs `url` and makes it the `Referer` if the response is 200
    ///
    /// Other statuses are logged and returned as-is; the caller decides
    /// whether that is fatal.
    pub async fn navigate(&self, url: &str) -> Result<Page> {
        let page = self.get(url).await?;

        if page.is_ok() {
            tracing::debug!(url, "Navigated");
            self.state().referer = url.to_string();
        } else {
            tracing::error!(url, status = %page.status, "Navigation failed");
        }

        Ok(page)
    }

    /// GETs `url` with the session identity, leaving the `Referer` untouched
    pub async fn get(&self, url: &str) -> Result<Page> {
        self.execute(url, |client| client.get(url)).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Page> {
        self.execute(url, |client| client.post(url).form(form)).await
    }

    /// Sends a request, retrying timeouts, connection failures and 5xx replies
    async fn execute<F>(&self, url: &str, build: F) -> Result<Page>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let request = self.decorate(build(&self.client));

            let reason = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    self.state().cookies.absorb_headers(response.headers());

                    if !status.is_server_error() || attempt >= self.retry.max_retries {
                        let body = response
                            .bytes()
                            .await
                            .map_err(|source| CrawlError::Transport {
                                url: url.to_string(),
                                source,
                            })?;
                        return Ok(Page {
                            url: url.to_string(),
                            status,
                            body: body.to_vec(),
                        });
                    }
                    format!("HTTP {}", status)
                }
                Err(source) => {
                    let err = CrawlError::Transport {
                        url: url.to_string(),
                        source,
                    };
                    if !err.is_retryable() || attempt >= self.retry.max_retries {
                        return Err(err);
                    }
                    err.to_string()
                }
            };

            let delay = self.retry.delay(attempt);
            attempt += 1;
            tracing::warn!(
                url,
                attempt,
                "Request failed ({}), retrying in {:?}",
                reason,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Attaches the session's `Referer` and cookies to a request
    fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        let state = self.state();
        let request = request.header(REFERER, state.referer.as_str());
        match state.cookies.header_value() {
            Some(cookies) => request.header(COOKIE, cookies),
            None => request,
        }
    }

    /// Writes the cookie jar to the configured store
    pub fn persist_cookies(&self) -> Result<()> {
        let jar = self.state().cookies.clone();
        save_jar(&jar, &self.cookies_path)?;
        tracing::info!(
            "Saved {} cookies to {}",
            jar.len(),
            self.cookies_path.display()
        );
        Ok(())
    }

    /// Merges the stored cookies into the session
    pub fn load_cookies(&self) -> Result<()> {
        let jar = load_jar(&self.cookies_path)?;
        let count = jar.len();
        self.state().cookies.merge(jar);
        tracing::info!(
            "Loaded {} cookies from {}",
            count,
            self.cookies_path.display()
        );
        Ok(())
    }
}

/// Extracts the hidden `post_key` input of the login form
fn extract_post_key(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse(r#"input[name="post_key"]"#).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Finds the `login: '<status>',` marker in the main page
fn login_marker(body: &str) -> Option<&str> {
    const PREFIX: &str = "login: '";

    let start = body.find(PREFIX)? + PREFIX.len();
    let rest = &body[start..];
    let status = &rest[..rest.find("',")?];

    status
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_')
        .then_some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_post_key() {
        let body = r#"<html><body><form>
            <input type="hidden" name="return_to" value="https://www.pixiv.net">
            <input type="hidden" name="post_key" value="0123abcd">
            </form></body></html>"#;
        assert_eq!(extract_post_key(body).as_deref(), Some("0123abcd"));
    }

    #[test]
    fn test_extract_post_key_missing() {
        assert_eq!(extract_post_key("<html><body></body></html>"), None);
        assert_eq!(
            extract_post_key(r#"<input type="hidden" name="post_key" value="">"#),
            None
        );
    }

    #[test]
    fn test_login_marker() {
        let body = "pixiv.context = { login: 'yes', token: 'abc' };";
        assert_eq!(login_marker(body), Some("yes"));

        let body = "pixiv.context = { login: 'no', };";
        assert_eq!(login_marker(body), Some("no"));

        assert_eq!(login_marker("<html></html>"), None);
        assert_eq!(login_marker("login: 'y e s',"), None);
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&NetworkConfig::default()).is_ok());
    }

    #[test]
    fn test_initial_state() {
        let endpoints = Endpoints::default();
        let manager = SessionManager::with_client(
            Client::new(),
            endpoints.clone(),
            AccountConfig {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
            PathBuf::from("cookies.json"),
            RetryPolicy::none(),
        );

        assert_eq!(manager.phase(), SessionPhase::Uninitialized);
        assert_eq!(manager.referer(), endpoints.login_url);
        assert_eq!(manager.cookie("PHPSESSID"), None);
    }
}
