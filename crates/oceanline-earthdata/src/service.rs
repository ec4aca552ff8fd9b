//! Remote service seam: login, search, download

use std::path::Path;

use chrono::Utc;
use oceanline_core::ProgressContext;

use crate::auth::{
    Credentials, Session, login_with_password, session_from_token, verify_token,
};
use crate::cmr::{CmrError, Granule, search_granules};
use crate::download::{DownloadError, DownloadReport, download_granules};
use crate::error::AuthError;
use crate::registry::DateRange;

/// The three operations the fetcher needs from the archive.
///
/// Search and download take a [`Session`], so neither can run before a
/// successful login.
pub trait DataService {
    fn login(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Granules of `short_name` within `range`; `count = None` means all.
    fn search(
        &self,
        session: &Session,
        short_name: &str,
        range: &DateRange,
        count: Option<usize>,
    ) -> Result<Vec<Granule>, CmrError>;

    fn download(
        &self,
        session: &Session,
        granules: &[Granule],
        destination: &Path,
        progress: &ProgressContext,
    ) -> Result<DownloadReport, DownloadError>;
}

/// Earthdata Login and CMR base URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub urs_url: String,
    pub cmr_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            urs_url: "https://urs.earthdata.nasa.gov".to_string(),
            cmr_url: "https://cmr.earthdata.nasa.gov".to_string(),
        }
    }
}

/// [`DataService`] backed by NASA Earthdata
#[derive(Debug, Clone, Default)]
pub struct EarthdataClient {
    endpoints: Endpoints,
}

impl EarthdataClient {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

impl DataService for EarthdataClient {
    fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        match credentials {
            Credentials::Token(token) => {
                let session = session_from_token(token, Utc::now())?;
                verify_token(&self.endpoints.urs_url, &session)?;
                Ok(session)
            }
            Credentials::Basic { username, password } => {
                login_with_password(&self.endpoints.urs_url, username, password)
            }
        }
    }

    fn search(
        &self,
        session: &Session,
        short_name: &str,
        range: &DateRange,
        count: Option<usize>,
    ) -> Result<Vec<Granule>, CmrError> {
        search_granules(
            &self.endpoints.cmr_url,
            Some(session.token()),
            short_name,
            range,
            count,
        )
    }

    fn download(
        &self,
        session: &Session,
        granules: &[Granule],
        destination: &Path,
        progress: &ProgressContext,
    ) -> Result<DownloadReport, DownloadError> {
        download_granules(session.token(), granules, destination, progress)
    }
}
