use crate::endpoint::{self, ApiVersion, Endpoint, Operation};
use crate::entities::{
    ContentEntry, LogEntry, PieceState, TorrentInfo, TorrentProperties, TrackerEntry,
    WebSeedEntry,
};
use crate::error::QbitError::{Configuration, InvalidInput, Unauthorized, UnexpectedResponse};
use crate::error::{QbitError, Result};
use crate::hash;
use crate::request::{self, AddTorrentRequest, LogQuery, PreparedRequest, TorrentFile, TorrentListQuery};
use crate::response::{self, FAILS, RawResponse};
use crate::session::{self, Session, SessionManager};
use log::{debug, warn};
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::env;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Environment variable holding the Web UI URL, read by [`QBittorrentClientBuilder::from_env`]
pub const URL_ENV: &str = "QBITTORRENT_URL";
/// Environment variable holding the request timeout in milliseconds
pub const TIMEOUT_ENV: &str = "QBITTORRENT_TIMEOUT_MS";

/// Outcome of the pre-login version check
#[derive(Debug, Clone, Copy)]
enum Negotiated {
    Known(ApiVersion),
    /// A v2 daemon that only reveals its version to authenticated clients
    AfterLogin,
}

/// qBittorrent Web API client
///
/// The client is meant to be shared: every method takes `&self` and concurrent
/// calls observe a consistent session.
pub struct QBittorrentClient {
    base_url: String,
    client: Client,
    api_version: Option<ApiVersion>,
    sessions: SessionManager,
}

impl QBittorrentClient {
    /// Creates a new `QBittorrentClient` for the Web UI at `url`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - URL is empty
    /// - URL doesn't start with "http://" or "https://"
    /// - The HTTP client cannot be initialized
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(url: String, timeout_ms: u64) -> Result<Self> {
        if url.is_empty() {
            return Err(Configuration("URL cannot be empty".into()));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Configuration(format!(
                "URL must start with http:// or https://, got: {url}"
            )));
        }

        // Remove trailing slash from URL if present
        let base_url = url.trim_end_matches('/').to_string();

        let client = Self::create_client(timeout_ms)?;

        Ok(Self {
            base_url,
            client,
            api_version: None,
            sessions: SessionManager::default(),
        })
    }

    /// Creates a configured HTTP client
    fn create_client(timeout: u64) -> Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_millis(timeout))
            .build()?)
    }

    /// Creates a new `QBittorrentClient` with a builder pattern
    #[must_use]
    pub fn builder() -> QBittorrentClientBuilder {
        QBittorrentClientBuilder::default()
    }

    /// Whether a session is currently held
    pub async fn is_authenticated(&self) -> bool {
        self.sessions.is_active().await
    }

    /// Web API version negotiated for the current session
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::Unauthenticated`] if there is no session
    pub async fn api_version(&self) -> Result<ApiVersion> {
        Ok(self.sessions.current().await?.api_version())
    }

    /// Logs in and stores the session cookie
    ///
    /// Any previous session is dropped first, also when the login fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Username is empty
    /// - Credentials are rejected or the client IP is banned
    /// - The Web API version cannot be negotiated
    /// - Network request fails
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() {
            return Err(InvalidInput("Username cannot be empty".into()));
        }

        let _writer = self.sessions.lock_writer().await;
        self.sessions.clear().await;

        let negotiated = self.negotiate().await?;
        let login_version = match negotiated {
            Negotiated::Known(version) => version,
            Negotiated::AfterLogin => ApiVersion::V2,
        };

        let endpoint = endpoint::resolve(Operation::Login, login_version)?;
        let params = vec![
            ("username", username.to_string()),
            ("password", password.to_string()),
        ];
        debug!("Logging in to {} (Web API {login_version})", self.base_url);
        let response = self
            .send_raw(request::prepare(&endpoint, None, params, &[]), None)
            .await?;
        let sid = session::extract_sid(response.headers());
        let raw = read(response).await?;

        if raw.status == StatusCode::UNAUTHORIZED || raw.status == StatusCode::FORBIDDEN {
            return Err(Unauthorized(format!(
                "Login refused with status {}, the client IP may be banned",
                raw.status.as_u16()
            )));
        }
        raw.ensure_success()?;
        if raw.body.trim() == FAILS {
            return Err(Unauthorized("Invalid username or password".into()));
        }
        let sid = sid.ok_or_else(|| UnexpectedResponse("Login succeeded without a SID cookie".into()))?;

        let api_version = match negotiated {
            Negotiated::Known(version) => version,
            Negotiated::AfterLogin => match self.session_api_version(&sid).await {
                Ok(version) => version,
                Err(err) => {
                    self.discard_sid(&sid).await;
                    return Err(err);
                }
            },
        };

        self.sessions.install(Session::new(sid, api_version)).await;
        Ok(())
    }

    /// Logs out and drops the session. Without a session this does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout request fails. The local session is
    /// cleared either way.
    pub async fn logout(&self) -> Result<()> {
        let _writer = self.sessions.lock_writer().await;
        let Some(session) = self.sessions.clear().await else {
            debug!("No active session to log out");
            return Ok(());
        };

        let endpoint = endpoint::resolve(Operation::Logout, session.api_version())?;
        let raw = self
            .send(
                request::prepare(&endpoint, None, Vec::new(), &[]),
                Some(&session.cookie()),
            )
            .await?;
        raw.ensure_success()
    }

    /// Gets the qBittorrent application version, e.g. `v4.6.7`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - There is no session or the daemon rejects it
    /// - Network request fails
    pub async fn get_qbittorrent_version(&self) -> Result<String> {
        let session = self.sessions.current().await?;
        let (_, raw) = self
            .call(&session, Operation::DaemonVersion, None, Vec::new(), &[])
            .await?;
        response::decode_text(&raw)
    }

    /// Lists torrents
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - There is no session or the daemon rejects it
    /// - Network request fails
    /// - Response cannot be parsed
    pub async fn get_torrent_list(&self, query: &TorrentListQuery) -> Result<Vec<TorrentInfo>> {
        let session = self.sessions.current().await?;
        let (_, raw) = self
            .call(&session, Operation::TorrentList, None, query.params(), &[])
            .await?;
        response::decode_json(&raw)
    }

    /// Adds torrents from `.torrent` files or from URLs/magnet links
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request has no payload or a malformed URL
    /// - There is no session or the daemon rejects it
    /// - The daemon refuses the torrent
    /// - Network request fails
    pub async fn add_torrents(&self, request: &AddTorrentRequest) -> Result<()> {
        request.validate()?;
        let session = self.sessions.current().await?;

        let names = endpoint::resolve(request.operation(), session.api_version())?.add_options;
        let (params, files) = request.fields(&names);
        debug!(
            "Adding torrents via {} with {} option field(s)",
            request.operation(),
            params.len()
        );
        let (_, raw) = self
            .call(&session, request.operation(), None, params, files)
            .await?;
        response::decode_add(&raw)
    }

    /// Gets general properties of a torrent, `None` if the daemon doesn't know the hash
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Hash is not 40 hexadecimal characters
    /// - There is no session or the daemon rejects it
    /// - Network request fails
    /// - Response cannot be parsed
    pub async fn get_torrent_properties(&self, hash: &str) -> Result<Option<TorrentProperties>> {
        self.lookup(Operation::Properties, hash).await
    }

    /// Gets the files of a torrent, `None` if the daemon doesn't know the hash
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_torrent_properties`]
    pub async fn get_torrent_contents(&self, hash: &str) -> Result<Option<Vec<ContentEntry>>> {
        self.lookup(Operation::Contents, hash).await
    }

    /// Gets the trackers of a torrent, `None` if the daemon doesn't know the hash
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_torrent_properties`]
    pub async fn get_torrent_trackers(&self, hash: &str) -> Result<Option<Vec<TrackerEntry>>> {
        self.lookup(Operation::Trackers, hash).await
    }

    /// Gets the web seeds of a torrent, `None` if the daemon doesn't know the hash
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_torrent_properties`]
    pub async fn get_torrent_web_seeds(&self, hash: &str) -> Result<Option<Vec<WebSeedEntry>>> {
        self.lookup(Operation::WebSeeds, hash).await
    }

    /// Gets the download state of every piece, `None` if the daemon doesn't know the hash
    ///
    /// The torrent's properties are read first to learn its declared piece count.
    /// A torrent without metadata yet (e.g. a fresh magnet link) declares zero pieces.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Hash is not 40 hexadecimal characters
    /// - There is no session or the daemon rejects it
    /// - The number of states differs from the declared piece count
    /// - Network request fails
    pub async fn get_torrent_piece_states(&self, hash: &str) -> Result<Option<Vec<PieceState>>> {
        let hash = hash::normalize(hash)?;
        let session = self.sessions.current().await?;
        let Some(expected) = self.declared_piece_count(&session, &hash).await? else {
            return Ok(None);
        };

        let (endpoint, raw) = self
            .call(&session, Operation::PieceStates, Some(&hash), Vec::new(), &[])
            .await?;
        response::decode_piece_states(&raw, &endpoint, expected)
    }

    /// Gets the lowercase hash of every piece, `None` if the daemon doesn't know the hash
    ///
    /// Piece hashes are 40 hex digits (SHA-1), or 64 for pure v2 torrents (SHA-256).
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_torrent_piece_states`], plus a piece hash that is
    /// neither 40 nor 64 hexadecimal characters
    pub async fn get_torrent_piece_hashes(&self, hash: &str) -> Result<Option<Vec<String>>> {
        let hash = hash::normalize(hash)?;
        let session = self.sessions.current().await?;
        let Some(expected) = self.declared_piece_count(&session, &hash).await? else {
            return Ok(None);
        };

        let (endpoint, raw) = self
            .call(&session, Operation::PieceHashes, Some(&hash), Vec::new(), &[])
            .await?;
        response::decode_piece_hashes(&raw, &endpoint, expected)
    }

    /// Pauses (stops, on qBittorrent 5) a torrent
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Hash is not 40 hexadecimal characters
    /// - There is no session or the daemon rejects it
    /// - Network request fails
    pub async fn pause_torrent(&self, hash: &str) -> Result<()> {
        self.command(Operation::Pause, hash).await
    }

    /// Resumes (starts, on qBittorrent 5) a torrent
    ///
    /// # Errors
    ///
    /// Same as [`Self::pause_torrent`]
    pub async fn resume_torrent(&self, hash: &str) -> Result<()> {
        self.command(Operation::Resume, hash).await
    }

    /// Removes a torrent, optionally deleting its downloaded data
    ///
    /// # Errors
    ///
    /// Same as [`Self::pause_torrent`]
    pub async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<()> {
        let operation = if delete_files {
            Operation::DeleteWithData
        } else {
            Operation::Delete
        };
        self.command(operation, hash).await
    }

    /// Reads the daemon's main log
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The negotiated Web API has no log endpoint
    /// - There is no session or the daemon rejects it
    /// - Network request fails
    /// - Response cannot be parsed
    pub async fn get_log(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let session = self.sessions.current().await?;
        let (_, raw) = self
            .call(&session, Operation::Log, None, query.params(), &[])
            .await?;
        response::decode_json(&raw)
    }

    async fn lookup<T: DeserializeOwned>(&self, operation: Operation, hash: &str) -> Result<Option<T>> {
        let hash = hash::normalize(hash)?;
        let session = self.sessions.current().await?;
        let (endpoint, raw) = self
            .call(&session, operation, Some(&hash), Vec::new(), &[])
            .await?;
        response::decode_lookup(&raw, &endpoint)
    }

    async fn command(&self, operation: Operation, hash: &str) -> Result<()> {
        let hash = hash::normalize(hash)?;
        let session = self.sessions.current().await?;
        let (_, raw) = self
            .call(&session, operation, Some(&hash), Vec::new(), &[])
            .await?;
        raw.ensure_success()
    }

    async fn declared_piece_count(&self, session: &Arc<Session>, hash: &str) -> Result<Option<usize>> {
        let (endpoint, raw) = self
            .call(session, Operation::Properties, Some(hash), Vec::new(), &[])
            .await?;
        let Some(properties) = response::decode_lookup::<TorrentProperties>(&raw, &endpoint)? else {
            return Ok(None);
        };

        Ok(Some(properties.piece_count().unwrap_or(0)))
    }

    /// Determines the Web API version before login
    async fn negotiate(&self) -> Result<Negotiated> {
        if let Some(version) = self.api_version {
            debug!("Using pinned Web API {version}");
            return Ok(Negotiated::Known(version));
        }

        let reply = self.fetch_api_version(ApiVersion::V2, None).await?;
        if reply.status == StatusCode::NOT_FOUND {
            let legacy = self.fetch_api_version(ApiVersion::legacy(0), None).await?;
            let level = response::decode_text(&legacy)?;
            let level: u32 = level
                .parse()
                .map_err(|_| UnexpectedResponse(format!("Malformed legacy API version: {level:?}")))?;
            debug!("Legacy Web API level {level}");
            return Ok(Negotiated::Known(ApiVersion::legacy(level)));
        }
        if reply.status == StatusCode::UNAUTHORIZED || reply.status == StatusCode::FORBIDDEN {
            debug!("Web API version is only available after login");
            return Ok(Negotiated::AfterLogin);
        }

        let version: ApiVersion = response::decode_text(&reply)?.parse()?;
        debug!("Negotiated Web API {version}");
        Ok(Negotiated::Known(version))
    }

    /// Reads the version a v2 daemon only reveals after login, and checks it is usable
    async fn session_api_version(&self, sid: &str) -> Result<ApiVersion> {
        let cookie = session::cookie_header(sid);
        let raw = self.fetch_api_version(ApiVersion::V2, Some(&cookie)).await?;
        let version: ApiVersion = response::decode_text(&raw)?.parse()?;
        endpoint::resolve(Operation::Logout, version)?;
        Ok(version)
    }

    /// Logs out a SID that will not be installed
    async fn discard_sid(&self, sid: &str) {
        if let Err(err) = self.logout_sid(sid).await {
            warn!("Failed to log out an unused session: {err}");
        }
    }

    async fn logout_sid(&self, sid: &str) -> Result<()> {
        let endpoint = endpoint::resolve(Operation::Logout, ApiVersion::V2)?;
        let cookie = session::cookie_header(sid);
        let raw = self
            .send(request::prepare(&endpoint, None, Vec::new(), &[]), Some(&cookie))
            .await?;
        raw.ensure_success()
    }

    async fn fetch_api_version(&self, version: ApiVersion, cookie: Option<&str>) -> Result<RawResponse> {
        let endpoint = endpoint::resolve(Operation::ApiVersion, version)?;
        self.send(request::prepare(&endpoint, None, Vec::new(), &[]), cookie)
            .await
    }

    /// Runs one protected operation with the session snapshot `session`
    ///
    /// A 401/403 clears that session and fails with [`QbitError::SessionExpired`].
    async fn call(
        &self,
        session: &Arc<Session>,
        operation: Operation,
        identity: Option<&str>,
        params: Vec<(&'static str, String)>,
        files: &[TorrentFile],
    ) -> Result<(Endpoint, RawResponse)> {
        let endpoint = endpoint::resolve(operation, session.api_version())?;
        let request = request::prepare(&endpoint, identity, params, files);
        let raw = self.send(request, Some(&session.cookie())).await?;

        if raw.status == StatusCode::UNAUTHORIZED || raw.status == StatusCode::FORBIDDEN {
            self.sessions.invalidate(session).await;
            return Err(QbitError::SessionExpired {
                status: raw.status.as_u16(),
            });
        }

        Ok((endpoint, raw))
    }

    async fn send(&self, request: PreparedRequest, cookie: Option<&str>) -> Result<RawResponse> {
        read(self.send_raw(request, cookie).await?).await
    }

    async fn send_raw(&self, request: PreparedRequest, cookie: Option<&str>) -> Result<Response> {
        debug!("Making API request: {} {}", request.method, request.path);

        let mut builder = request
            .into_builder(&self.client, &self.base_url)?
            .header(REFERER, &self.base_url);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }

        Ok(builder.send().await?)
    }
}

async fn read(response: Response) -> Result<RawResponse> {
    let status = response.status();
    let body = response.text().await?;
    debug!("API request status: {status}, {} byte(s)", body.len());
    Ok(RawResponse::new(status, body))
}

/// Builder for [`QBittorrentClient`]
#[derive(Default)]
pub struct QBittorrentClientBuilder {
    url: Option<String>,
    timeout: Option<u64>,
    api_version: Option<ApiVersion>,
}

impl QBittorrentClientBuilder {
    /// Starts a builder from `QBITTORRENT_URL` and, if set, `QBITTORRENT_TIMEOUT_MS`
    ///
    /// # Errors
    ///
    /// Returns an error if `QBITTORRENT_URL` is missing or the timeout isn't a number
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::default().url(env::var(URL_ENV)?);

        match env::var(TIMEOUT_ENV) {
            Ok(timeout) => {
                let timeout = timeout.parse().map_err(|_| {
                    Configuration(format!(
                        "{TIMEOUT_ENV} must be a number of milliseconds, got: {timeout}"
                    ))
                })?;
                builder = builder.timeout(timeout);
            }
            Err(env::VarError::NotPresent) => {}
            Err(err) => return Err(err.into()),
        }

        Ok(builder)
    }

    /// Sets the Web UI URL, e.g. `http://localhost:8080`
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the request timeout in milliseconds
    #[must_use]
    pub fn timeout(mut self, timeout_millis: u64) -> Self {
        self.timeout = Some(timeout_millis);
        self
    }

    /// Pins the Web API version instead of negotiating it at login
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Builds the [`QBittorrentClient`] client
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - URL is not provided
    /// - URL doesn't start with "http://" or "https://"
    pub fn build(self) -> Result<QBittorrentClient> {
        let url = self
            .url
            .ok_or_else(|| Configuration("URL is required".into()))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS);

        let mut client = QBittorrentClient::new(url, timeout)?;
        client.api_version = self.api_version;

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            QBittorrentClient::builder().build(),
            Err(QbitError::Configuration(_))
        ));
        assert!(matches!(
            QBittorrentClient::builder().url("localhost:8080").build(),
            Err(QbitError::Configuration(_))
        ));

        let client = QBittorrentClient::builder()
            .url("http://localhost:8080/")
            .timeout(500)
            .build()
            .unwrap();
        assert_eq!("http://localhost:8080", client.base_url);
        assert!(client.api_version.is_none());
    }

    #[tokio::test]
    async fn test_protected_calls_need_login() {
        let client = QBittorrentClient::builder()
            .url("http://127.0.0.1:9")
            .build()
            .unwrap();

        assert!(!client.is_authenticated().await);
        assert!(matches!(
            client.get_torrent_list(&TorrentListQuery::default()).await,
            Err(QbitError::Unauthenticated)
        ));
        assert!(matches!(client.api_version().await, Err(QbitError::Unauthenticated)));
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_hash_fails_before_session_check() {
        let client = QBittorrentClient::builder()
            .url("http://127.0.0.1:9")
            .build()
            .unwrap();

        assert!(matches!(
            client.get_torrent_properties("xyz").await,
            Err(QbitError::InvalidIdentity(_))
        ));
        assert!(matches!(
            client.pause_torrent(&"a".repeat(41)).await,
            Err(QbitError::InvalidIdentity(_))
        ));
    }
}
