//! Shared HTTP client, runtime and streaming file download.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface: the fetcher is strictly sequential.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::ProgressBar;

use crate::files::tmp_path;
use crate::progress::upgrade_to_bar;

/// Buffer size for writing downloaded bodies (256KB)
const WRITE_BUF_SIZE: usize = 256 * 1024;

/// HTTP behaviour shared by every request in the process
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// No data for this long = stall
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// Retry attempts for transient failures (0 = fail on first error)
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            max_retries: 0,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the process-wide HTTP config. Must run before the first request;
/// later calls are ignored.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already set, ignoring");
    }
}

/// Current HTTP config (defaults if never set).
pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Error types for stream operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Http { .. } => None,
        }
    }
}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Io(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            // No status = connection-level failure
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(s), ..
            } => *s == 408 || *s == 429 || (500..=599).contains(s),
            // Disk full is not retryable, timeout IS retryable
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(http_config().connect_timeout)
        .user_agent(concat!("oceanline/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// HTTP GET → file, via `<dest>.tmp` and an atomic rename.
///
/// Sends `bearer` as an `Authorization: Bearer` header when given. The
/// progress bar is upgraded to a byte bar once the content length is known.
/// On any failure the partial tmp file is removed and `dest` is untouched.
///
/// Returns the number of bytes written.
pub fn download_file(
    url: &str,
    bearer: Option<&str>,
    dest: &Path,
    pb: &ProgressBar,
) -> Result<u64, StreamError> {
    let tmp = tmp_path(dest);
    let result = stream_to_file(url, bearer, &tmp, pb);

    match result {
        Ok(bytes) => {
            fs::rename(&tmp, dest)?;
            Ok(bytes)
        }
        Err(e) => {
            if tmp.exists() {
                let _ = fs::remove_file(&tmp);
            }
            Err(e)
        }
    }
}

fn stream_to_file(
    url: &str,
    bearer: Option<&str>,
    tmp: &Path,
    pb: &ProgressBar,
) -> Result<u64, StreamError> {
    SHARED_RUNTIME
        .handle()
        .block_on(stream_to_file_async(url, bearer, tmp, pb))
}

async fn stream_to_file_async(
    url: &str,
    bearer: Option<&str>,
    tmp: &Path,
    pb: &ProgressBar,
) -> Result<u64, StreamError> {
    let read_timeout = http_config().read_timeout;

    let mut request = http_client().get(url);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = match tokio::time::timeout(read_timeout, request.send()).await {
        Ok(sent) => sent
            .and_then(|r| r.error_for_status())
            .map_err(|e| StreamError::from_reqwest(&e))?,
        Err(_) => return Err(stall_error(read_timeout)),
    };

    if let Some(total) = response.content_length() {
        upgrade_to_bar(pb, total);
    }

    let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, File::create(tmp)?);
    let mut body = response.bytes_stream();
    let mut written = 0u64;

    loop {
        match tokio::time::timeout(read_timeout, body.next()).await {
            Ok(Some(chunk)) => {
                let chunk = chunk.map_err(|e| StreamError::from_reqwest(&e))?;
                out.write_all(&chunk)?;
                written += chunk.len() as u64;
                pb.inc(chunk.len() as u64);
            }
            Ok(None) => break,
            Err(_) => return Err(stall_error(read_timeout)),
        }
    }

    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(written)
}

fn stall_error(timeout: Duration) -> StreamError {
    StreamError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("read timeout ({}s with no data)", timeout.as_secs()),
    ))
}
