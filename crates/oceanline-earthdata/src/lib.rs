//! Oceanline Earthdata - NASA Earthdata ocean-color fetcher
//!
//! Authenticates against Earthdata Login, searches the CMR catalog by
//! collection short name and date range, and downloads matching granules
//! into one directory per dataset.
//!
//! # Example
//!
//! ```ignore
//! use oceanline_earthdata::{
//!     Credentials, EarthdataClient, Registry, RunOptions, authenticate, default_entries,
//!     default_range, run,
//! };
//!
//! let client = EarthdataClient::default();
//! let session = authenticate(&client, &Credentials::from_env()?)?;
//! let registry = Registry::new(default_entries(".".as_ref()), default_range())?;
//! let summary = run(&client, session, &registry, &RunOptions::default(), &progress)?;
//! ```

pub mod auth;
pub mod cmr;
pub mod download;
pub mod error;
pub mod registry;
pub mod runner;
pub mod service;
pub mod token;

// Re-exports
pub use auth::{AuthStrategy, Credentials, Session, authenticate};
pub use cmr::{CmrError, Granule};
pub use download::{DownloadError, DownloadReport};
pub use error::{AuthError, FetchError};
pub use registry::{
    DEFAULT_DATASETS, DatasetEntry, DateRange, RangeError, Registry, RegistryError,
    default_entries, default_range,
};
pub use runner::{DatasetOutcome, FailurePolicy, RunOptions, RunSummary, run};
pub use service::{DataService, EarthdataClient, Endpoints};
