//! Index and diff runs: extraction, probing, baseline persistence and drift detection wired
//! together.

pub mod config;
pub mod logging;
pub mod report;

use audit_core::{Regression, ServerStatus};
use baseline_store::{Baseline, StatePath, StoreError};
use drift::{DriftError, HashCheck};
use endpoints::IgnoreList;
use reachability::{HttpProber, ProbeError, ProbeOptions, Prober};
use std::sync::Arc;
use tracing::{debug, error, info, Instrument};

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Drift(#[from] DriftError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("configuration and baseline cannot both be read from stdin")]
    StdinConflict,
}

/// Resolved options for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub state: StatePath,
    pub ignore: IgnoreList,
    pub probe: ProbeOptions,
    pub hash_check: HashCheck,
}

impl Settings {
    /// A diff reads the baseline from `state`; refuse to take the configuration from stdin too.
    pub fn check_diff_input(&self, input: &StatePath) -> Result<(), AuditError> {
        if input.is_stdio() && self.state.is_stdio() {
            return Err(AuditError::StdinConflict);
        }
        Ok(())
    }
}

/// Read the configuration for a diff run, after checking it does not compete with the baseline
/// for stdin.
pub fn read_diff_input(input: &StatePath, settings: &Settings) -> Result<Vec<u8>, AuditError> {
    settings.check_diff_input(input)?;
    Ok(baseline_store::read_input(input)?)
}

#[derive(Debug, Clone)]
pub struct DiffOutcome {
    pub results: Vec<ServerStatus>,
    pub regressions: Vec<Regression>,
}

impl DiffOutcome {
    pub fn is_clean(&self) -> bool {
        self.regressions.is_empty()
    }
}

/// Probe every endpoint in `config` and save the results as the new baseline. The fingerprint
/// covers the bytes exactly as read.
pub async fn index<P: Prober>(config: &[u8], settings: &Settings, prober: Arc<P>) -> Result<Baseline, AuditError> {
    let span = tracing::info_span!("index", state = %settings.state);
    async move {
        let groups = endpoints::extract(&String::from_utf8_lossy(config), &settings.ignore);
        let config_hash = baseline_store::fingerprint(config);
        debug!(groups = groups.len(), hash = %config_hash, "parsed config");
        let results = reachability::probe(prober, &groups, &settings.probe).await;
        let baseline = baseline_store::save(&settings.state, &config_hash, &results)?;
        info!(endpoints = results.len(), "baseline written");
        Ok::<_, AuditError>(baseline)
    }
    .instrument(span)
    .await
}

/// [`index`] with the HTTP(S) prober built from `settings`.
pub async fn index_http(config: &[u8], settings: &Settings) -> Result<Baseline, AuditError> {
    let prober = Arc::new(HttpProber::new(settings.probe.timeout)?);
    index(config, settings, prober).await
}

/// [`diff`] with the HTTP(S) prober built from `settings`.
pub async fn diff_http(config: &[u8], settings: &Settings) -> Result<DiffOutcome, AuditError> {
    let prober = Arc::new(HttpProber::new(settings.probe.timeout)?);
    diff(config, settings, prober).await
}

/// Compare a fresh probe of `config` against the stored baseline.
///
/// A fingerprint mismatch (when enforced) fails before anything is probed. Regressions are
/// returned in the outcome rather than as an error.
pub async fn diff<P: Prober>(config: &[u8], settings: &Settings, prober: Arc<P>) -> Result<DiffOutcome, AuditError> {
    let span = tracing::info_span!("diff", state = %settings.state);
    async move {
        let groups = endpoints::extract(&String::from_utf8_lossy(config), &settings.ignore);
        let baseline = baseline_store::load(&settings.state)?;
        let config_hash = baseline_store::fingerprint(config);
        drift::verify_fingerprint(&config_hash, &baseline.config_hash, settings.hash_check)?;

        let results = reachability::probe(prober, &groups, &settings.probe).await;
        let regressions = drift::diff(&results, &baseline.server_statuses);
        if regressions.is_empty() {
            info!(endpoints = results.len(), "no diffs found");
        } else {
            error!(count = regressions.len(), "found diffs");
            for r in &regressions {
                error!(
                    server_name = %r.server_name,
                    port = r.port,
                    orig_status_code = ?r.orig_status_code,
                    new_status_code = ?r.new_status_code,
                    status_message = %r.status_message,
                    "server status changed"
                );
            }
        }
        Ok::<_, AuditError>(DiffOutcome { results, regressions })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::StatusMessage;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const CONFIG: &[u8] = b"\
server {
    listen 80;
    listen 443 ssl;
    server_name a.example.com b.example.com;
}
server {
    listen 8080;
    server_name internal.example.com;
}
";

    /// Answers from a table keyed by server name; unknown names are refused.
    #[derive(Default)]
    struct Table {
        codes: Mutex<HashMap<String, u16>>,
        calls: AtomicUsize,
    }

    impl Table {
        fn with(entries: &[(&str, u16)]) -> Arc<Self> {
            let t = Table::default();
            for (name, code) in entries {
                t.codes.lock().unwrap().insert(name.to_string(), *code);
            }
            Arc::new(t)
        }
    }

    impl Prober for Table {
        async fn probe(&self, server_name: &str, port: u16) -> ServerStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let code = self.codes.lock().unwrap().get(server_name).copied();
            match code {
                Some(c) => ServerStatus::ok(server_name, port, c),
                None => ServerStatus::failed(server_name, port, StatusMessage::ConnRefused),
            }
        }
    }

    fn settings(dir: &tempfile::TempDir, check: HashCheck) -> Settings {
        Settings {
            state: StatePath::File(dir.path().join("state.json")),
            ignore: IgnoreList::default(),
            probe: ProbeOptions { concurrency: 3, timeout: Duration::from_secs(1) },
            hash_check: check,
        }
    }

    #[tokio::test]
    async fn index_records_every_pair() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Enforce);
        let prober = Table::with(&[("a.example.com", 200), ("b.example.com", 301)]);
        let baseline = index(CONFIG, &s, prober.clone()).await.unwrap();
        assert_eq!(baseline.server_statuses.len(), 4);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 4);
        assert_eq!(baseline.config_hash, baseline_store::fingerprint(CONFIG));
        assert_eq!(baseline_store::load(&s.state).unwrap().server_statuses.len(), 4);
    }

    #[tokio::test]
    async fn unchanged_round_trip_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Enforce);
        let prober = Table::with(&[("a.example.com", 200), ("b.example.com", 301)]);
        index(CONFIG, &s, prober.clone()).await.unwrap();
        let outcome = diff(CONFIG, &s, prober).await.unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.results.len(), 4);
    }

    #[tokio::test]
    async fn status_change_is_a_regression() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Enforce);
        index(CONFIG, &s, Table::with(&[("a.example.com", 200), ("b.example.com", 200)])).await.unwrap();
        let outcome = diff(CONFIG, &s, Table::with(&[("a.example.com", 500), ("b.example.com", 200)])).await.unwrap();
        assert_eq!(outcome.regressions.len(), 2);
        for r in &outcome.regressions {
            assert_eq!(r.server_name, "a.example.com");
            assert_eq!(r.orig_status_code, Some(200));
            assert_eq!(r.new_status_code, Some(500));
        }
    }

    #[tokio::test]
    async fn changed_config_fails_before_probing() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Enforce);
        index(CONFIG, &s, Table::with(&[("a.example.com", 200)])).await.unwrap();
        let changed = String::from_utf8_lossy(CONFIG).replace("b.example.com", "c.example.com");
        let prober = Table::with(&[("a.example.com", 200)]);
        let err = diff(changed.as_bytes(), &s, prober.clone()).await.unwrap_err();
        assert!(matches!(err, AuditError::Drift(DriftError::FingerprintMismatch { .. })));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skipped_verification_compares_anyway() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Skip);
        index(CONFIG, &s, Table::with(&[("a.example.com", 200), ("b.example.com", 200)])).await.unwrap();
        let changed = [CONFIG, b"# comment\n".as_slice()].concat();
        let outcome = diff(&changed, &s, Table::with(&[("a.example.com", 200), ("b.example.com", 200)])).await.unwrap();
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn missing_baseline_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Enforce);
        let err = diff(CONFIG, &s, Table::with(&[])).await.unwrap_err();
        assert!(matches!(err, AuditError::Store(StoreError::Read { .. })));
    }

    #[tokio::test]
    async fn config_with_non_utf8_bytes_is_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, HashCheck::Enforce);
        let config = [b"# caf\xe9 comment\n".as_slice(), CONFIG].concat();
        let prober = Table::with(&[("a.example.com", 200), ("b.example.com", 200)]);
        let baseline = index(&config, &s, prober.clone()).await.unwrap();
        assert_eq!(baseline.server_statuses.len(), 4);
        assert_eq!(baseline.config_hash, baseline_store::fingerprint(&config));
        assert!(diff(&config, &s, prober).await.unwrap().is_clean());
    }

    #[test]
    fn diff_refuses_config_and_baseline_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(&dir, HashCheck::Enforce);
        s.state = StatePath::from("-");
        let err = read_diff_input(&StatePath::from("-"), &s).unwrap_err();
        assert!(matches!(err, AuditError::StdinConflict));
        assert_eq!(err.to_string(), "configuration and baseline cannot both be read from stdin");
    }

    #[test]
    fn diff_input_from_file_with_baseline_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(&dir, HashCheck::Enforce);
        s.state = StatePath::from("-");
        let p = dir.path().join("nginx.conf");
        std::fs::write(&p, CONFIG).unwrap();
        assert!(s.check_diff_input(&StatePath::from(p.as_path())).is_ok());
        assert_eq!(read_diff_input(&StatePath::from(p.as_path()), &s).unwrap(), CONFIG);
    }
}
