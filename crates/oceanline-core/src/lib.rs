//! Oceanline Core - Common infrastructure for ocean-color data fetching
//!
//! Environment loading, logging, progress reporting and the shared
//! HTTP client used by the Earthdata fetcher and the CLI.

pub mod env;
pub mod files;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod stream;

// Re-exports for convenience
pub use env::{EnvError, load_env_file};
pub use files::{cleanup_tmp_files, tmp_path};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::retry_with_backoff;
pub use stream::{
    HttpConfig, SHARED_RUNTIME, StreamError, download_file, http_client, http_config,
    set_http_config,
};
