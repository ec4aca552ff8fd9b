//! Earthdata Login: credentials from the environment and the session they produce

use chrono::{DateTime, NaiveDate, Utc};
use oceanline_core::{SHARED_RUNTIME, StreamError, http_client, retry_with_backoff};
use serde::Deserialize;

use crate::error::AuthError;
use crate::service::DataService;
use crate::token::{self, EXPIRY_MARGIN};

pub const TOKEN_VAR: &str = "EARTHDATA_TOKEN";
pub const USERNAME_VAR: &str = "EARTHDATA_USERNAME";
pub const PASSWORD_VAR: &str = "EARTHDATA_PASSWORD";

/// How the session was obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Pre-issued bearer token
    Token,
    /// Username/password exchanged for a token
    Password,
}

impl std::fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Token => "token",
            Self::Password => "password",
        })
    }
}

/// Credentials for the "environment" login strategy
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Credentials::Token(..)"),
            Self::Basic { username, .. } => f
                .debug_struct("Credentials::Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`. A token wins over username/password;
    /// empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(TOKEN_VAR) {
            return Ok(Self::Token(token.trim().to_string()));
        }
        match (get(USERNAME_VAR), get(PASSWORD_VAR)) {
            (Some(username), Some(password)) => Ok(Self::Basic { username, password }),
            _ => Err(AuthError::MissingCredentials),
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        match self {
            Self::Token(_) => AuthStrategy::Token,
            Self::Basic { .. } => AuthStrategy::Password,
        }
    }
}

/// Authenticated context for catalog searches and downloads.
///
/// Only produced by a successful login; never mutated afterwards.
pub struct Session {
    token: String,
    username: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    strategy: AuthStrategy,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("expires_at", &self.expires_at)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        token: impl Into<String>,
        username: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        strategy: AuthStrategy,
    ) -> Self {
        Self {
            token: token.into(),
            username,
            expires_at,
            strategy,
        }
    }

    /// Bearer token sent with every request
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    /// Human-readable status line
    pub fn status(&self) -> String {
        let user = self.username.as_deref().unwrap_or("unknown user");
        let expiry = self
            .expires_at
            .map(|t| format!("expires {}", t.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_else(|| "expiry unknown".to_string());
        format!("authenticated as {user} via {} ({expiry})", self.strategy)
    }
}

/// Log in through `service` and report the session status.
///
/// Must succeed before any search or download: those calls take the
/// returned [`Session`].
pub fn authenticate<S: DataService + ?Sized>(
    service: &S,
    credentials: &Credentials,
) -> Result<Session, AuthError> {
    log::debug!("Logging in to Earthdata ({} strategy)", credentials.strategy());
    match service.login(credentials) {
        Ok(session) => {
            log::info!("Auth status: {}", session.status());
            Ok(session)
        }
        Err(e) => {
            log::error!("Auth status: failed ({e})");
            Err(e)
        }
    }
}

/// Build a session from a pre-issued token, checking its expiry claim.
///
/// The token must be an Earthdata Login JWT carrying a `uid` claim; anything
/// else is rejected without contacting the server.
pub fn session_from_token(token: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
    let session = session_from_claims(token, now)?;
    if session.username.is_none() {
        return Err(AuthError::MalformedToken);
    }
    Ok(session)
}

/// Session from whatever claims `token` carries. Opaque tokens get an
/// unknown user and expiry.
fn session_from_claims(token: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
    let (username, expires_at) = match token::decode_claims(token) {
        Some(claims) => {
            if token::is_expired(&claims, now) {
                if let Some(expired_at) = claims.expires_at {
                    return Err(AuthError::Expired { expired_at });
                }
            }
            if token::is_expiring_soon(&claims, now, EXPIRY_MARGIN) {
                log::warn!("Earthdata token expires within 24h, consider generating a new one");
            }
            (claims.uid, claims.expires_at)
        }
        None => {
            log::debug!("Token is not a decodable JWT, expiry unknown");
            (None, None)
        }
    };
    Ok(Session::new(token, username, expires_at, AuthStrategy::Token))
}

/// Ask Earthdata Login whether the session token is still accepted.
///
/// `GET {urs}/api/users/{uid}` with the bearer token. 401/403 mean the token
/// is revoked or invalid.
pub fn verify_token(urs_url: &str, session: &Session) -> Result<(), AuthError> {
    let uid = session.username().ok_or(AuthError::MalformedToken)?;
    let url = format!("{}/api/users/{uid}", urs_url.trim_end_matches('/'));

    retry_with_backoff("Earthdata Login", || {
        SHARED_RUNTIME.handle().block_on(async {
            http_client()
                .get(&url)
                .bearer_auth(session.token())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;
            Ok::<_, StreamError>(())
        })
    })
    .map_err(login_error)
}

fn login_error(e: StreamError) -> AuthError {
    match e.status() {
        Some(status @ (401 | 403)) => AuthError::Rejected { status },
        _ => AuthError::Http(e),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// `MM/DD/YYYY`
    expiration_date: Option<String>,
}

/// Exchange username/password for a user token at Earthdata Login.
///
/// Uses `POST {urs}/api/users/find_or_create_token`, which returns an
/// existing unexpired token or issues a new one.
pub fn login_with_password(
    urs_url: &str,
    username: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let url = format!(
        "{}/api/users/find_or_create_token",
        urs_url.trim_end_matches('/')
    );

    let body = retry_with_backoff("Earthdata Login", || {
        SHARED_RUNTIME.handle().block_on(async {
            let resp = http_client()
                .post(&url)
                .basic_auth(username, Some(password))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;
            let text = resp.text().await.map_err(|e| StreamError::from_reqwest(&e))?;
            Ok::<_, StreamError>(text)
        })
    })
    .map_err(login_error)?;

    let mut session = parse_token_response(&body, Utc::now())?;
    if session.username.is_none() {
        session.username = Some(username.to_string());
    }
    session.strategy = AuthStrategy::Password;
    Ok(session)
}

/// Parse the JSON answer of the token endpoint into a session
fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
    let resp: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::InvalidResponse(format!("token JSON: {e}")))?;
    if resp.access_token.is_empty() {
        return Err(AuthError::InvalidResponse("empty access_token".to_string()));
    }

    let mut session = session_from_claims(&resp.access_token, now)?;
    if session.expires_at.is_none() {
        session.expires_at = resp
            .expiration_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%m/%d/%Y").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
    }
    Ok(session)
}
