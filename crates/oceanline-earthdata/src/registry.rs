//! Dataset registry and the shared date range of a run

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

/// Ocean-color collections fetched when no registry is configured
pub struct KnownDataset {
    pub name: &'static str,
    pub short_name: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_DATASETS: &[KnownDataset] = &[
    KnownDataset {
        name: "chlorophyll",
        short_name: "PACE_OCI_L3B_CHL",
        description: "PACE OCI Level-3 binned chlorophyll-a concentration",
    },
    KnownDataset {
        name: "phytoplankton",
        short_name: "PACE_OCI_L4M_MOANA_NRT",
        description: "PACE OCI Level-4 MOANA phytoplankton community (near real-time)",
    },
    KnownDataset {
        name: "iop",
        short_name: "PACE_OCI_L3M_IOP",
        description: "PACE OCI Level-3 mapped inherent optical properties",
    },
];

/// Default date range (inclusive)
pub fn default_range() -> DateRange {
    DateRange {
        start: NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid date"),
        end: NaiveDate::from_ymd_opt(2025, 10, 3).expect("valid date"),
    }
}

/// Default registry entries, with destinations under `<root>/datasets/`
pub fn default_entries(root: &Path) -> Vec<DatasetEntry> {
    DEFAULT_DATASETS
        .iter()
        .map(|d| DatasetEntry::under_root(d.name, d.short_name, root))
        .collect()
}

/// One dataset to fetch: catalog short name and local destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    /// Local label, also the default directory name
    pub name: String,
    /// CMR collection short name
    pub short_name: String,
    pub destination: PathBuf,
}

impl DatasetEntry {
    pub fn new(
        name: impl Into<String>,
        short_name: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            short_name: short_name.into(),
            destination: destination.into(),
        }
    }

    /// Entry stored at `<root>/datasets/<name>`
    pub fn under_root(name: &str, short_name: &str, root: &Path) -> Self {
        Self::new(name, short_name, root.join("datasets").join(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    Parse { value: String, message: String },
    Reversed { start: NaiveDate, end: NaiveDate },
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { value, message } => {
                write!(f, "invalid date {value:?} (expected YYYY-MM-DD): {message}")
            }
            Self::Reversed { start, end } => {
                write!(f, "date range start {start} is after end {end}")
            }
        }
    }
}

impl std::error::Error for RangeError {}

/// Inclusive date range shared by every dataset in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| RangeError::Parse {
        value: s.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Empty,
    DuplicateName(String),
    UnknownDataset(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "dataset registry is empty"),
            Self::DuplicateName(name) => write!(f, "dataset {name:?} is listed twice"),
            Self::UnknownDataset(name) => write!(f, "unknown dataset {name:?}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Ordered datasets plus the date range they share. Immutable once built.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<DatasetEntry>,
    range: DateRange,
}

impl Registry {
    pub fn new(entries: Vec<DatasetEntry>, range: DateRange) -> Result<Self, RegistryError> {
        if entries.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(RegistryError::DuplicateName(entry.name.clone()));
            }
        }
        Ok(Self { entries, range })
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Keep only the named datasets, in registry order.
    ///
    /// Names match either the local name or the catalog short name.
    pub fn select(&self, names: &[String]) -> Result<Self, RegistryError> {
        if let Some(unknown) = names.iter().find(|n| {
            !self
                .entries
                .iter()
                .any(|e| &e.name == *n || &e.short_name == *n)
        }) {
            return Err(RegistryError::UnknownDataset(unknown.clone()));
        }
        let entries = self
            .entries
            .iter()
            .filter(|e| names.iter().any(|n| *n == e.name || *n == e.short_name))
            .cloned()
            .collect();
        Self::new(entries, self.range)
    }

    /// Same datasets over a different date range
    pub fn with_range(&self, range: DateRange) -> Self {
        Self {
            entries: self.entries.clone(),
            range,
        }
    }
}
