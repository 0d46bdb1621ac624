//! Session seam
//!
//! The application only needs to know whether a request carries a valid
//! session. Sessions are obtained by following a verification link that is
//! mailed to the account owner.

use super::error::{HightechError, Result};
use super::mail::{MailMessage, MailSender};
use async_trait::async_trait;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of a persistent session cookie, in seconds
pub const PERSISTENT_MAX_AGE: u64 = 30 * 24 * 60 * 60;

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
}

/// Session provider failures
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown or already used verification key '{0}'")]
    UnknownVerifyKey(String),

    #[error("session state lock poisoned")]
    Poisoned,
}

impl From<SessionError> for HightechError {
    fn from(err: SessionError) -> Self {
        HightechError::upstream("session provider", err)
    }
}

/// Trait for session providers
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Extract a valid session from request headers
    fn parse(&self, headers: &HeaderMap) -> Option<Session>;

    /// Exchange a mailed verification key for a session
    async fn verify(&self, key: &str) -> Result<Session>;

    /// Mail a fresh verification link to the account owner
    async fn send_verify(&self) -> Result<()>;

    /// Attach the session cookie to a response
    fn save(&self, session: &Session, response: &mut HeaderMap, persistent: bool);
}

/// Read a cookie value from request headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Append a `Set-Cookie` header
pub fn write_cookie(response: &mut HeaderMap, name: &str, value: &str, max_age: Option<u64>) {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, value);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(cookie = %name, error = %e, "dropping unencodable cookie"),
    }
}

/// Process-local session provider
///
/// Verification keys are single use. Sessions live as long as the process.
pub struct InMemorySessions {
    cookie_name: String,
    verify_url: String,
    mailer: Arc<dyn MailSender>,
    pending: RwLock<HashSet<String>>,
    active: RwLock<HashSet<String>>,
}

impl InMemorySessions {
    /// Create a provider
    ///
    /// `verify_url` is the base of the mailed link; the key is appended as
    /// the last path segment.
    pub fn new(
        cookie_name: impl Into<String>,
        verify_url: impl Into<String>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            verify_url: verify_url.into(),
            mailer,
            pending: RwLock::new(HashSet::new()),
            active: RwLock::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl SessionProvider for InMemorySessions {
    fn parse(&self, headers: &HeaderMap) -> Option<Session> {
        let token = read_cookie(headers, &self.cookie_name)?;
        let active = self.active.read().ok()?;
        active.contains(&token).then_some(Session { token })
    }

    async fn verify(&self, key: &str) -> Result<Session> {
        let known = self
            .pending
            .write()
            .map_err(|_| SessionError::Poisoned)?
            .remove(key);
        if !known {
            return Err(SessionError::UnknownVerifyKey(key.to_string()).into());
        }

        let token = Uuid::new_v4().to_string();
        self.active
            .write()
            .map_err(|_| SessionError::Poisoned)?
            .insert(token.clone());

        tracing::info!("verification key accepted, session opened");
        Ok(Session { token })
    }

    async fn send_verify(&self) -> Result<()> {
        let key = Uuid::new_v4().to_string();
        self.pending
            .write()
            .map_err(|_| SessionError::Poisoned)?
            .insert(key.clone());

        let link = format!("{}/{}", self.verify_url.trim_end_matches('/'), key);
        self.mailer
            .send(MailMessage {
                subject: "High Tech Timesheet Verification".to_string(),
                body: link,
                attachments: Vec::new(),
            })
            .await
    }

    fn save(&self, session: &Session, response: &mut HeaderMap, persistent: bool) {
        let max_age = persistent.then_some(PERSISTENT_MAX_AGE);
        write_cookie(response, &self.cookie_name, &session.token, max_age);
    }
}
