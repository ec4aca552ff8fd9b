//! Granule download into a dataset directory
//!
//! Files are written as `<name>.tmp` and renamed on completion, so the
//! destination only ever holds whole files (plus whatever a crash leaves as
//! `.tmp`, which the next run removes). Files already present are skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use oceanline_core::progress::fmt_num;
use oceanline_core::{
    ProgressContext, StreamError, cleanup_tmp_files, download_file, retry_with_backoff,
};

use crate::cmr::Granule;

/// What happened in one dataset directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    /// Already present from an earlier run
    pub skipped: usize,
    pub bytes: u64,
}

/// A file transfer that failed
#[derive(Debug)]
pub struct DownloadError {
    pub file: String,
    pub source: StreamError,
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file, self.source)
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// One file to fetch or skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub url: String,
    pub path: PathBuf,
    pub skip: bool,
}

/// File name of a download URL: last path segment, query and fragment removed
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    if name.is_empty() || name == ".." || name == "." {
        return None;
    }
    Some(name)
}

/// Map granules to local files.
///
/// A file counts as present when it exists and, for single-file granules with
/// an exact catalog byte count, has that size. The same file name listed twice
/// is planned once.
pub fn plan_transfers(granules: &[Granule], destination: &Path) -> Vec<PlannedFile> {
    let mut seen = HashSet::new();
    let mut plan = Vec::new();

    for granule in granules {
        if granule.urls.is_empty() {
            log::warn!("{}: no HTTPS data link, skipping", granule.id);
            continue;
        }
        let expected = if granule.urls.len() == 1 {
            granule.size_bytes
        } else {
            None
        };

        for url in &granule.urls {
            let Some(name) = file_name_from_url(url) else {
                log::warn!("{}: cannot derive file name from {url}", granule.id);
                continue;
            };
            if !seen.insert(name.to_string()) {
                continue;
            }
            let path = destination.join(name);
            let skip = is_present(&path, expected);
            plan.push(PlannedFile {
                url: url.clone(),
                path,
                skip,
            });
        }
    }
    plan
}

fn is_present(path: &Path, expected: Option<u64>) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => match expected {
            Some(size) if meta.len() != size => {
                log::debug!(
                    "{}: size {} differs from catalog size {size}, fetching again",
                    path.display(),
                    meta.len()
                );
                false
            }
            _ => true,
        },
        _ => false,
    }
}

/// Download every file of `granules` into `destination`.
///
/// Creates the directory if needed and removes stale `.tmp` files first.
/// Stops at the first failed transfer; completed files stay in place.
pub fn download_granules(
    token: &str,
    granules: &[Granule],
    destination: &Path,
    progress: &ProgressContext,
) -> Result<DownloadReport, DownloadError> {
    let dir_error = |e: std::io::Error| DownloadError {
        file: destination.display().to_string(),
        source: StreamError::Io(e),
    };
    std::fs::create_dir_all(destination).map_err(dir_error)?;
    cleanup_tmp_files(destination).map_err(dir_error)?;

    let plan = plan_transfers(granules, destination);
    let to_fetch = plan.iter().filter(|p| !p.skip).count();
    let mut report = DownloadReport {
        skipped: plan.len() - to_fetch,
        ..Default::default()
    };
    if report.skipped > 0 {
        log::info!(
            "{}: {} files already present",
            destination.display(),
            fmt_num(report.skipped)
        );
    }

    for (i, file) in plan.iter().filter(|p| !p.skip).enumerate() {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pb = progress.file_bar(&name);
        pb.set_message(format!("{}/{}", i + 1, to_fetch));

        let result = retry_with_backoff(&name, || {
            pb.reset();
            download_file(&file.url, Some(token), &file.path, &pb)
        });
        pb.finish_and_clear();

        match result {
            Ok(bytes) => {
                log::debug!("{name}: {bytes} bytes");
                report.downloaded += 1;
                report.bytes += bytes;
            }
            Err(source) => {
                return Err(DownloadError { file: name, source });
            }
        }
    }

    Ok(report)
}
