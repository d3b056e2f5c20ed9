//! Session state shared by all requests of one client.
//!
//! The current session sits behind a read/write lock as an `Arc` snapshot:
//! every request clones the `Arc` once and uses that cookie for its whole
//! exchange. Login and logout are additionally serialized by a writer mutex
//! held across their network round trip.

use crate::endpoint::ApiVersion;
use crate::error::{QbitError, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, SET_COOKIE};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Name of the qBittorrent session cookie
pub const SID_COOKIE: &str = "SID";

/// An authenticated session: the SID cookie, when it was issued and the Web
/// API version negotiated for it
#[derive(Clone)]
pub struct Session {
    sid: String,
    issued_at: DateTime<Utc>,
    api_version: ApiVersion,
}

impl Session {
    #[must_use]
    pub fn new(sid: impl Into<String>, api_version: ApiVersion) -> Self {
        Self {
            sid: sid.into(),
            issued_at: Utc::now(),
            api_version,
        }
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// Value of the `Cookie` header carrying this session
    pub(crate) fn cookie(&self) -> String {
        cookie_header(&self.sid)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sid", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("api_version", &self.api_version)
            .finish()
    }
}

pub(crate) fn cookie_header(sid: &str) -> String {
    format!("{SID_COOKIE}={sid}")
}

/// Finds the SID value among the `Set-Cookie` headers of a login response
pub(crate) fn extract_sid(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SID_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[derive(Default)]
pub(crate) struct SessionManager {
    current: RwLock<Option<Arc<Session>>>,
    writer: Mutex<()>,
}

impl SessionManager {
    /// Serializes login/logout. Hold the guard for the whole exchange.
    pub(crate) async fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Snapshot of the active session
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::Unauthenticated`] when no session is active
    pub(crate) async fn current(&self) -> Result<Arc<Session>> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(QbitError::Unauthenticated)
    }

    pub(crate) async fn is_active(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub(crate) async fn install(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write().await = Some(Arc::clone(&session));
        debug!("Session established, Web API {}", session.api_version());
        session
    }

    pub(crate) async fn clear(&self) -> Option<Arc<Session>> {
        let previous = self.current.write().await.take();
        if previous.is_some() {
            debug!("Session cleared");
        }
        previous
    }

    /// Drops `stale` after the daemon rejected it. A session installed since
    /// the request was sent is left alone.
    pub(crate) async fn invalidate(&self, stale: &Arc<Session>) -> bool {
        let mut current = self.current.write().await;
        match current.as_ref() {
            Some(active) if Arc::ptr_eq(active, stale) => {
                *current = None;
                warn!("qBittorrent rejected the session cookie, session cleared");
                true
            }
            _ => false,
        }
    }
}
