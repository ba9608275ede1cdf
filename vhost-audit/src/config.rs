use crate::Settings;
use anyhow::{bail, Context, Result};
use baseline_store::StatePath;
use drift::HashCheck;
use endpoints::IgnoreList;
use reachability::{ProbeOptions, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "vhost-audit.yaml";
pub const DEFAULT_STATE_FILE: &str = "vhost-audit.state.json";

/// Defaults read from YAML; every key is optional and command-line flags win.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub concurrency: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub verify_hash: Option<bool>,
    pub ignore: Option<Vec<String>>,
    pub state: Option<PathBuf>,
}

/// Load an explicit config file, or `./vhost-audit.yaml` when present.
pub fn load_config(path: Option<&Path>) -> Result<Option<FileConfig>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(Some(cfg))
}

/// Values given on the command line for a single run.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub state: Option<PathBuf>,
    pub ignore: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout: Option<String>,
    pub no_verify_hash: bool,
}

pub fn parse_timeout(s: &str) -> Result<Duration> {
    humantime::parse_duration(s.trim()).with_context(|| format!("failed to parse timeout {s:?}"))
}

impl Overrides {
    /// Merge flags over the file config over built-in defaults.
    pub fn resolve(&self, file: Option<&FileConfig>) -> Result<Settings> {
        let file = file.cloned().unwrap_or_default();
        let timeout = match &self.timeout {
            Some(s) => parse_timeout(s)?,
            None => file.timeout.unwrap_or(DEFAULT_TIMEOUT),
        };
        let concurrency = self.concurrency.or(file.concurrency).unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        let ignore = match &self.ignore {
            Some(list) => endpoints::parse_ignore_list(list),
            None => file.ignore.unwrap_or_default().into_iter().collect::<IgnoreList>(),
        };
        let state = self
            .state
            .clone()
            .or(file.state)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
        let verify = !self.no_verify_hash && file.verify_hash.unwrap_or(true);
        Ok(Settings {
            state: StatePath::from(state),
            ignore,
            probe: ProbeOptions { concurrency, timeout },
            hash_check: HashCheck::from_enabled(verify),
        })
    }
}
