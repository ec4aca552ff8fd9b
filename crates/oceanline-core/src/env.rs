//! Environment file loading
//!
//! Reads `KEY=value` pairs from a `.env`-style file into the process
//! environment. Runs once at startup, before logging is initialised.

use std::path::{Path, PathBuf};

/// Error from reading an environment file
#[derive(Debug)]
pub enum EnvError {
    /// Malformed line in the file
    Parse { line: String, index: usize },
    /// File exists but could not be read
    Io(std::io::Error),
    /// Any other loader failure
    Other(String),
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { line, index } => {
                write!(f, "malformed env file entry at offset {index}: {line:?}")
            }
            Self::Io(e) => write!(f, "cannot read env file: {e}"),
            Self::Other(msg) => write!(f, "env file error: {msg}"),
        }
    }
}

impl std::error::Error for EnvError {}

/// Load an environment file into the process environment.
///
/// With `path = None`, searches `.env` in the current directory and its
/// ancestors. Variables already present in the environment are not
/// overridden.
///
/// Returns the path that was loaded, or `None` when no file exists. A missing
/// file is not an error: later steps fail on the variables they need.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, EnvError> {
    let result = match path {
        Some(p) => dotenvy::from_path(p).map(|()| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(e) if e.not_found() => Ok(None),
        Err(dotenvy::Error::LineParse(line, index)) => Err(EnvError::Parse { line, index }),
        Err(dotenvy::Error::Io(e)) => Err(EnvError::Io(e)),
        Err(e) => Err(EnvError::Other(e.to_string())),
    }
}
