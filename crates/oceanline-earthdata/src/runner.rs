//! Fetch orchestration: search then download, one dataset at a time

use std::path::PathBuf;
use std::time::{Duration, Instant};

use indicatif::HumanBytes;
use oceanline_core::ProgressContext;
use oceanline_core::progress::fmt_num;

use crate::auth::Session;
use crate::download::DownloadReport;
use crate::error::FetchError;
use crate::registry::{DatasetEntry, Registry};
use crate::service::DataService;

/// What to do when one dataset fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the run on the first error
    #[default]
    FailFast,
    /// Record the error, continue with the next dataset
    Continue,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub policy: FailurePolicy,
    /// Search only, report counts, download nothing
    pub dry_run: bool,
    /// Max granules per dataset (None = all)
    pub limit: Option<usize>,
}

/// Result for one registry entry
#[derive(Debug)]
pub struct DatasetOutcome {
    pub name: String,
    pub short_name: String,
    pub destination: PathBuf,
    /// Granules matched by the search
    pub granules: usize,
    /// None when nothing was downloaded (dry run or failure)
    pub report: Option<DownloadReport>,
    pub error: Option<FetchError>,
}

impl DatasetOutcome {
    fn new(entry: &DatasetEntry) -> Self {
        Self {
            name: entry.name.clone(),
            short_name: entry.short_name.clone(),
            destination: entry.destination.clone(),
            granules: 0,
            report: None,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run execution summary
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<DatasetOutcome>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }

    pub fn total_granules(&self) -> usize {
        self.outcomes.iter().map(|o| o.granules).sum()
    }

    pub fn total_downloaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.report)
            .map(|r| r.downloaded)
            .sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.report)
            .map(|r| r.skipped)
            .sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.report)
            .map(|r| r.bytes)
            .sum()
    }

    /// Log summary lines (non-TTY output)
    pub fn log(&self) {
        log::info!("=== Fetch Summary ===");
        for o in &self.outcomes {
            match (&o.error, o.report) {
                (Some(e), _) => log::error!("{}: FAILED ({e})", o.name),
                (None, Some(r)) => log::info!(
                    "{}: {} granules, {} downloaded, {} present, {}",
                    o.name,
                    fmt_num(o.granules),
                    fmt_num(r.downloaded),
                    fmt_num(r.skipped),
                    HumanBytes(r.bytes)
                ),
                (None, None) => log::info!("{}: {} granules", o.name, fmt_num(o.granules)),
            }
        }
        log::info!(
            "Datasets: {}/{} ok, {} downloaded ({}), {:.1}s",
            self.outcomes.len() - self.failed(),
            self.outcomes.len(),
            fmt_num(self.total_downloaded()),
            HumanBytes(self.total_bytes()),
            self.elapsed.as_secs_f64()
        );
    }
}

/// Fetch every registry entry, in order, with `session`.
///
/// Under [`FailurePolicy::FailFast`] the first error is returned and later
/// entries are not touched. Under [`FailurePolicy::Continue`] errors are
/// recorded per dataset and the summary is always returned.
///
/// The session is consumed: it lives exactly as long as the run.
pub fn run<S: DataService + ?Sized>(
    service: &S,
    session: Session,
    registry: &Registry,
    options: &RunOptions,
    progress: &ProgressContext,
) -> Result<RunSummary, FetchError> {
    let start = Instant::now();
    let range = registry.range();

    log::info!(
        "Fetching {} datasets for {range} ({} days){}",
        registry.entries().len(),
        range.days(),
        if options.dry_run { " [dry run]" } else { "" }
    );

    let mut outcomes = Vec::with_capacity(registry.entries().len());

    for entry in registry.entries() {
        let mut outcome = DatasetOutcome::new(entry);
        let line = progress.dataset_line(&entry.name);

        let result = fetch_dataset(service, &session, entry, registry, options, progress, &line);
        line.finish_and_clear();

        match result {
            Ok((granules, report)) => {
                outcome.granules = granules;
                outcome.report = report;
            }
            Err(e) => {
                log::error!("{}: {e}", entry.name);
                if options.policy == FailurePolicy::FailFast {
                    return Err(e);
                }
                outcome.error = Some(e);
            }
        }
        outcomes.push(outcome);
    }

    drop(session);

    Ok(RunSummary {
        outcomes,
        elapsed: start.elapsed(),
    })
}

/// Search + download for one entry. Returns (granule count, download report).
fn fetch_dataset<S: DataService + ?Sized>(
    service: &S,
    session: &Session,
    entry: &DatasetEntry,
    registry: &Registry,
    options: &RunOptions,
    progress: &ProgressContext,
    line: &indicatif::ProgressBar,
) -> Result<(usize, Option<DownloadReport>), FetchError> {
    line.set_message(format!("searching {}", entry.short_name));
    let granules = service
        .search(session, &entry.short_name, &registry.range(), options.limit)
        .map_err(|source| FetchError::Search {
            dataset: entry.short_name.clone(),
            source,
        })?;

    if granules.is_empty() {
        return Err(FetchError::EmptyResult {
            dataset: entry.short_name.clone(),
        });
    }
    progress.info(format!(
        "Found {} files for dataset {}",
        granules.len(),
        entry.short_name
    ));

    if options.dry_run {
        return Ok((granules.len(), None));
    }

    line.set_message(format!(
        "downloading {} granules to {}",
        fmt_num(granules.len()),
        entry.destination.display()
    ));
    let report = service
        .download(session, &granules, &entry.destination, progress)
        .map_err(|source| FetchError::Download {
            dataset: entry.short_name.clone(),
            source,
        })?;
    progress.info(format!(
        "{}: {} downloaded, {} already present ({})",
        entry.short_name,
        fmt_num(report.downloaded),
        fmt_num(report.skipped),
        HumanBytes(report.bytes)
    ));

    Ok((granules.len(), Some(report)))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use oceanline_core::StreamError;

    use super::*;
    use crate::auth::{AuthStrategy, Credentials, authenticate};
    use crate::cmr::{CmrError, Granule};
    use crate::download::DownloadError;
    use crate::error::AuthError;
    use crate::registry::DateRange;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Login,
        Search {
            short_name: String,
            range: DateRange,
        },
        Download {
            ids: Vec<String>,
            destination: PathBuf,
        },
    }

    /// Recording service with canned search results
    #[derive(Default)]
    struct FakeService {
        calls: RefCell<Vec<Call>>,
        results: HashMap<String, usize>,
        failing_login: bool,
        failing_search: Option<String>,
        failing_download: Option<String>,
    }

    impl FakeService {
        fn with_results(results: &[(&str, usize)]) -> Self {
            Self {
                results: results.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl DataService for FakeService {
        fn login(&self, _credentials: &Credentials) -> Result<Session, AuthError> {
            self.calls.borrow_mut().push(Call::Login);
            if self.failing_login {
                return Err(AuthError::Rejected { status: 401 });
            }
            Ok(session())
        }

        fn search(
            &self,
            _session: &Session,
            short_name: &str,
            range: &DateRange,
            count: Option<usize>,
        ) -> Result<Vec<Granule>, CmrError> {
            self.calls.borrow_mut().push(Call::Search {
                short_name: short_name.to_string(),
                range: *range,
            });
            if self.failing_search.as_deref() == Some(short_name) {
                return Err(CmrError::Stream(StreamError::Http {
                    status: Some(500),
                    message: "internal".to_string(),
                }));
            }
            let n = self.results.get(short_name).copied().unwrap_or(0);
            let n = count.map_or(n, |c| n.min(c));
            Ok((0..n)
                .map(|i| Granule {
                    id: format!("{short_name}-{i}"),
                    concept_id: None,
                    urls: vec![format!("https://h/{short_name}-{i}.nc")],
                    size_bytes: None,
                })
                .collect())
        }

        fn download(
            &self,
            _session: &Session,
            granules: &[Granule],
            destination: &Path,
            _progress: &ProgressContext,
        ) -> Result<DownloadReport, DownloadError> {
            self.calls.borrow_mut().push(Call::Download {
                ids: granules.iter().map(|g| g.id.clone()).collect(),
                destination: destination.to_path_buf(),
            });
            if let Some(failing) = &self.failing_download {
                if granules.iter().any(|g| g.id.starts_with(failing.as_str())) {
                    return Err(DownloadError {
                        file: format!("{failing}-0.nc"),
                        source: StreamError::Io(std::io::Error::other("connection reset")),
                    });
                }
            }
            Ok(DownloadReport {
                downloaded: granules.len(),
                skipped: 0,
                bytes: 100 * granules.len() as u64,
            })
        }
    }

    /// Logger keeping every message, shared by all tests in this binary
    struct Recorder(Mutex<Vec<String>>);

    impl log::Log for Recorder {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.0.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    static RECORDER: Recorder = Recorder(Mutex::new(Vec::new()));

    fn record_logs() {
        if log::set_logger(&RECORDER).is_ok() {
            log::set_max_level(log::LevelFilter::Info);
        }
    }

    fn logged() -> Vec<String> {
        RECORDER.0.lock().unwrap().clone()
    }

    fn session() -> Session {
        Session::new("token", Some("jdoe".to_string()), None, AuthStrategy::Token)
    }

    fn range() -> DateRange {
        DateRange::parse("2025-09-01", "2025-10-03").unwrap()
    }

    fn registry(entries: &[(&str, &str)]) -> Registry {
        Registry::new(
            entries
                .iter()
                .map(|(name, dest)| DatasetEntry::new(*name, *name, *dest))
                .collect(),
            range(),
        )
        .unwrap()
    }

    fn searches(calls: &[Call]) -> Vec<&str> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Search { short_name, .. } => Some(short_name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn search_uses_each_identifier_and_shared_range() {
        let service = FakeService::with_results(&[("A", 1), ("B", 2), ("C", 3)]);
        let reg = registry(&[("A", "/tmp/a"), ("B", "/tmp/b"), ("C", "/tmp/c")]);

        run(&service, session(), &reg, &RunOptions::default(), &ProgressContext::hidden())
            .unwrap();

        let calls = service.calls();
        assert_eq!(searches(&calls), ["A", "B", "C"]);
        for call in &calls {
            if let Call::Search { range: r, .. } = call {
                assert_eq!(*r, range());
            }
        }
    }

    #[test]
    fn three_results_give_one_download_with_all_handles() {
        let service = FakeService::with_results(&[("A", 3)]);
        let reg = registry(&[("A", "/tmp/a")]);

        let summary = run(
            &service,
            session(),
            &reg,
            &RunOptions::default(),
            &ProgressContext::hidden(),
        )
        .unwrap();

        let downloads: Vec<_> = service
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Download { .. }))
            .collect();
        assert_eq!(
            downloads,
            [Call::Download {
                ids: vec!["A-0".to_string(), "A-1".to_string(), "A-2".to_string()],
                destination: PathBuf::from("/tmp/a"),
            }]
        );
        assert_eq!(summary.outcomes[0].granules, 3);
        assert_eq!(summary.total_downloaded(), 3);
        assert_eq!(summary.failed(), 0);
    }

    #[test]
    fn empty_result_aborts_before_download_and_later_entries() {
        let service = FakeService::with_results(&[("A", 2), ("C", 2)]);
        let reg = registry(&[("A", "/tmp/a"), ("B", "/tmp/b"), ("C", "/tmp/c")]);

        let err = run(
            &service,
            session(),
            &reg,
            &RunOptions::default(),
            &ProgressContext::hidden(),
        )
        .unwrap_err();

        assert!(matches!(&err, FetchError::EmptyResult { dataset } if dataset == "B"));
        let calls = service.calls();
        assert_eq!(searches(&calls), ["A", "B"]);
        assert!(!calls.iter().any(
            |c| matches!(c, Call::Download { destination, .. } if destination == Path::new("/tmp/b"))
        ));
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn download_happens_before_next_search() {
        let service = FakeService::with_results(&[("A", 1), ("B", 1)]);
        let reg = registry(&[("A", "/tmp/a"), ("B", "/tmp/b")]);

        run(&service, session(), &reg, &RunOptions::default(), &ProgressContext::hidden())
            .unwrap();

        let kinds: Vec<&str> = service
            .calls()
            .iter()
            .map(|c| match c {
                Call::Login => "login",
                Call::Search { .. } => "search",
                Call::Download { .. } => "download",
            })
            .collect();
        assert_eq!(kinds, ["search", "download", "search", "download"]);
    }

    #[test]
    fn authentication_precedes_search_and_download() {
        let service = FakeService::with_results(&[("A", 1)]);
        let reg = registry(&[("A", "/tmp/a")]);

        let session = authenticate(&service, &Credentials::Token("t".to_string())).unwrap();
        run(&service, session, &reg, &RunOptions::default(), &ProgressContext::hidden())
            .unwrap();

        let calls = service.calls();
        assert_eq!(calls[0], Call::Login);
        assert_eq!(calls.iter().filter(|c| **c == Call::Login).count(), 1);
    }

    #[test]
    fn found_line_names_count_and_dataset() {
        record_logs();
        let service = FakeService::with_results(&[("SCENARIO_A", 3)]);
        let reg = registry(&[("SCENARIO_A", "/tmp/scenario-a")]);

        run(&service, session(), &reg, &RunOptions::default(), &ProgressContext::hidden())
            .unwrap();

        assert!(logged()
            .iter()
            .any(|line| line == "Found 3 files for dataset SCENARIO_A"));
    }

    #[test]
    fn empty_scenario_reports_dataset() {
        record_logs();
        let service = FakeService::with_results(&[]);
        let reg = registry(&[("SCENARIO_B", "/tmp/scenario-b")]);

        let err = run(
            &service,
            session(),
            &reg,
            &RunOptions::default(),
            &ProgressContext::hidden(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "no files found for dataset SCENARIO_B");
        assert!(!logged()
            .iter()
            .any(|line| line.contains("files for dataset SCENARIO_B")));
    }

    #[test]
    fn failed_login_means_no_search_or_download() {
        let service = FakeService {
            failing_login: true,
            ..FakeService::with_results(&[("A", 3)])
        };

        let err = authenticate(&service, &Credentials::Token("t".to_string())).unwrap_err();

        assert!(matches!(err, AuthError::Rejected { status: 401 }));
        assert_eq!(service.calls(), [Call::Login]);
    }

    #[test]
    fn search_failure_is_fatal_by_default() {
        let service = FakeService {
            failing_search: Some("A".to_string()),
            ..FakeService::with_results(&[("A", 1), ("B", 1)])
        };
        let reg = registry(&[("A", "/tmp/a"), ("B", "/tmp/b")]);

        let err = run(
            &service,
            session(),
            &reg,
            &RunOptions::default(),
            &ProgressContext::hidden(),
        )
        .unwrap_err();

        assert!(matches!(err, FetchError::Search { .. }));
        assert_eq!(service.calls().len(), 1);
    }

    #[test]
    fn download_failure_is_fatal_by_default() {
        let service = FakeService {
            failing_download: Some("A".to_string()),
            ..FakeService::with_results(&[("A", 2), ("B", 1)])
        };
        let reg = registry(&[("A", "/tmp/a"), ("B", "/tmp/b")]);

        let err = run(
            &service,
            session(),
            &reg,
            &RunOptions::default(),
            &ProgressContext::hidden(),
        )
        .unwrap_err();

        assert!(matches!(&err, FetchError::Download { dataset, .. } if dataset == "A"));
        assert_eq!(searches(&service.calls()), ["A"]);
    }

    #[test]
    fn continue_policy_isolates_failures() {
        let service = FakeService {
            failing_download: Some("A".to_string()),
            ..FakeService::with_results(&[("A", 2), ("C", 4)])
        };
        let reg = registry(&[("A", "/tmp/a"), ("B", "/tmp/b"), ("C", "/tmp/c")]);
        let options = RunOptions {
            policy: FailurePolicy::Continue,
            ..Default::default()
        };

        let summary = run(&service, session(), &reg, &options, &ProgressContext::hidden())
            .unwrap();

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.outcomes[0].error.as_ref().unwrap().kind(), "download");
        assert_eq!(summary.outcomes[1].error.as_ref().unwrap().kind(), "empty");
        assert!(summary.outcomes[2].is_ok());
        assert_eq!(summary.outcomes[2].granules, 4);
        assert_eq!(summary.total_downloaded(), 4);
        assert_eq!(summary.total_bytes(), 400);
    }

    #[test]
    fn dry_run_searches_without_downloading() {
        let service = FakeService::with_results(&[("A", 5)]);
        let reg = registry(&[("A", "/tmp/a")]);
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };

        let summary = run(&service, session(), &reg, &options, &ProgressContext::hidden())
            .unwrap();

        assert_eq!(summary.total_granules(), 5);
        assert!(summary.outcomes[0].report.is_none());
        assert!(!service
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Download { .. })));
    }

    #[test]
    fn limit_is_passed_to_search() {
        let service = FakeService::with_results(&[("A", 10)]);
        let reg = registry(&[("A", "/tmp/a")]);
        let options = RunOptions {
            limit: Some(2),
            ..Default::default()
        };

        let summary = run(&service, session(), &reg, &options, &ProgressContext::hidden())
            .unwrap();

        assert_eq!(summary.total_granules(), 2);
    }
}
