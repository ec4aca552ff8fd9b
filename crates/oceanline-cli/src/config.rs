//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use oceanline_earthdata::{
    DatasetEntry, DateRange, Endpoints, Registry, default_entries, default_range,
};

/// Global configuration for oceanline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub earthdata: EarthdataConfig,
    pub range: RangeConfig,
    pub http: HttpSection,
    /// Replaces the built-in dataset list when non-empty
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Data root; datasets land in `<root>/datasets/<name>`. Defaults to the
    /// directory one level above the one holding the executable.
    #[serde(deserialize_with = "deserialize_env_path")]
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| root_above(&exe))
            .unwrap_or_else(|| PathBuf::from("."));
        Self { root }
    }
}

/// Directory one level above the one holding `exe`
fn root_above(exe: &Path) -> Option<PathBuf> {
    let exe = std::fs::canonicalize(exe).unwrap_or_else(|_| exe.to_path_buf());
    exe.parent()?.parent().map(Path::to_path_buf)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EarthdataConfig {
    pub urs_url: String,
    pub cmr_url: String,
    /// Bearer token; takes precedence over `EARTHDATA_*` variables
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
}

impl Default for EarthdataConfig {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            urs_url: endpoints.urs_url,
            cmr_url: endpoints.cmr_url,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub start: String,
    pub end: String,
}

impl Default for RangeConfig {
    fn default() -> Self {
        let range = default_range();
        Self {
            start: range.start().to_string(),
            end: range.end().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Seconds without data before a transfer counts as stalled
    pub read_timeout: u64,
    pub max_retries: u32,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            read_timeout: 30,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub destination: Option<PathBuf>,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Same as `deserialize_env_var`, but an unset variable is an error
fn deserialize_env_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    expand_env_var(&s)
        .map(PathBuf::from)
        .ok_or_else(|| serde::de::Error::custom(format!("environment variable in {s} is not set")))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./oceanline.toml (current directory)
    /// 2. ~/.config/oceanline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("oceanline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "oceanline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            urs_url: self.earthdata.urs_url.clone(),
            cmr_url: self.earthdata.cmr_url.clone(),
        }
    }

    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::parse(&self.range.start, &self.range.end).context("Invalid [range] in config")
    }

    /// Registry of configured datasets (built-in list when none), rooted at
    /// `root` or `[output] root`
    pub fn registry(&self, root: Option<&Path>) -> Result<Registry> {
        let root = root.unwrap_or(self.output.root.as_path());
        let entries = if self.datasets.is_empty() {
            default_entries(root)
        } else {
            self.datasets
                .iter()
                .map(|d| match &d.destination {
                    Some(dest) => DatasetEntry::new(&d.name, &d.short_name, dest),
                    None => DatasetEntry::under_root(&d.name, &d.short_name, root),
                })
                .collect()
        };
        Ok(Registry::new(entries, self.date_range()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        let exe_dir = std::env::current_exe().unwrap().canonicalize().unwrap();
        assert_eq!(
            Some(config.output.root.as_path()),
            exe_dir.parent().unwrap().parent()
        );
        assert_eq!(config.earthdata.cmr_url, "https://cmr.earthdata.nasa.gov");
        assert_eq!(config.range.start, "2025-09-01");
        assert_eq!(config.range.end, "2025-10-03");
        assert_eq!(config.http.max_retries, 0);
        assert!(config.datasets.is_empty());
    }

    #[test]
    fn default_registry() {
        let registry = Config::default().registry(Some(Path::new("/data"))).unwrap();
        let names: Vec<_> = registry
            .entries()
            .iter()
            .map(|e| e.short_name.as_str())
            .collect();
        assert_eq!(
            names,
            ["PACE_OCI_L3B_CHL", "PACE_OCI_L4M_MOANA_NRT", "PACE_OCI_L3M_IOP"]
        );
        assert_eq!(
            registry.entries()[0].destination,
            PathBuf::from("/data/datasets/chlorophyll")
        );
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("OCEANLINE_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${OCEANLINE_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("OCEANLINE_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[output]
root = "/srv/ocean"

[range]
start = "2025-01-01"
end = "2025-01-31"

[http]
read_timeout = 60
max_retries = 3

[[datasets]]
name = "chl"
short_name = "PACE_OCI_L3B_CHL"

[[datasets]]
name = "sst"
short_name = "MODIS_A-JPL-L2P-v2019.0"
destination = "/scratch/sst"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.http.read_timeout, 60);
        assert_eq!(config.http.max_retries, 3);

        let registry = config.registry(None).unwrap();
        assert_eq!(registry.range().days(), 31);
        assert_eq!(
            registry.entries()[0].destination,
            PathBuf::from("/srv/ocean/datasets/chl")
        );
        assert_eq!(
            registry.entries()[1].destination,
            PathBuf::from("/scratch/sst")
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let toml = r#"
[range]
start = "2025-02-01"
end = "2025-01-01"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.registry(None).is_err());
    }

    #[test]
    fn token_from_env_reference() {
        std::env::set_var("OCEANLINE_TEST_TOKEN", "abc");
        let toml = r#"
[earthdata]
token = "${OCEANLINE_TEST_TOKEN}"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.earthdata.token.as_deref(), Some("abc"));
        std::env::remove_var("OCEANLINE_TEST_TOKEN");
    }

    #[test]
    fn data_root_is_one_level_above_executable_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let bin = dir.path().join("project").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let exe = bin.join("oceanline");
        std::fs::write(&exe, b"").unwrap();

        let root = root_above(&exe).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap().join("project"));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("oceanline.toml");
        std::fs::write(&path, "[output]\nroot = \"/tmp/oc\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.output.root, PathBuf::from("/tmp/oc"));
    }
}
