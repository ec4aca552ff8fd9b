//! Error types for authentication and dataset fetching

use chrono::{DateTime, Utc};
use oceanline_core::StreamError;

use crate::cmr::CmrError;
use crate::download::DownloadError;

/// Failure to establish an Earthdata session. Always fatal.
#[derive(Debug)]
pub enum AuthError {
    /// Neither a token nor a username/password pair is set
    MissingCredentials,
    /// Token is not an Earthdata Login JWT with a `uid` claim
    MalformedToken,
    /// Token expiry claim is in the past
    Expired { expired_at: DateTime<Utc> },
    /// Earthdata Login refused the credentials
    Rejected { status: u16 },
    /// Earthdata Login answered with something we cannot read
    InvalidResponse(String),
    /// Network failure talking to Earthdata Login
    Http(StreamError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => write!(
                f,
                "no Earthdata credentials: set EARTHDATA_TOKEN, or EARTHDATA_USERNAME and EARTHDATA_PASSWORD"
            ),
            Self::MalformedToken => write!(
                f,
                "EARTHDATA_TOKEN is not an Earthdata Login token (expected a JWT with a uid claim)"
            ),
            Self::Expired { expired_at } => write!(
                f,
                "Earthdata token expired at {}",
                expired_at.format("%Y-%m-%d %H:%M UTC")
            ),
            Self::Rejected { status } => {
                write!(f, "Earthdata Login rejected the credentials (HTTP {status})")
            }
            Self::InvalidResponse(msg) => write!(f, "unexpected Earthdata Login response: {msg}"),
            Self::Http(e) => write!(f, "Earthdata Login unreachable: {e}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

/// Error from fetching one dataset (search + download).
#[derive(Debug)]
pub enum FetchError {
    Authentication(AuthError),
    /// Catalog query failed
    Search { dataset: String, source: CmrError },
    /// Catalog query succeeded but matched nothing
    EmptyResult { dataset: String },
    /// A file transfer failed; the destination may be partially populated
    Download {
        dataset: String,
        source: DownloadError,
    },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication(e) => write!(f, "authentication failed: {e}"),
            Self::Search { dataset, source } => write!(f, "search failed for {dataset}: {source}"),
            Self::EmptyResult { dataset } => {
                write!(f, "no files found for dataset {dataset}")
            }
            Self::Download { dataset, source } => {
                write!(f, "download failed for {dataset}: {source}")
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Authentication(e) => Some(e),
            Self::Search { source, .. } => Some(source),
            Self::EmptyResult { .. } => None,
            Self::Download { source, .. } => Some(source),
        }
    }
}

impl From<AuthError> for FetchError {
    fn from(e: AuthError) -> Self {
        Self::Authentication(e)
    }
}

impl FetchError {
    /// Short label for summary tables
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "auth",
            Self::Search { .. } => "search",
            Self::EmptyResult { .. } => "empty",
            Self::Download { .. } => "download",
        }
    }
}
