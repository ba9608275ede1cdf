//! Status-code drift between a fresh probe run and a stored baseline.
//!
//! Matching is by (server name, port) only. Endpoints present on one side but not the other are
//! not reported, and a pair that occurs more than once on either side can be reported more than
//! once.

use audit_core::{Regression, ServerStatus};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DriftError {
    #[error("config hash mismatch: {current} != {baseline}")]
    FingerprintMismatch { current: String, baseline: String },
}

/// Whether a diff run insists on the baseline having been taken from the same configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashCheck {
    #[default]
    Enforce,
    Skip,
}

impl HashCheck {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { HashCheck::Enforce } else { HashCheck::Skip }
    }
}

/// Refuse to compare against a baseline recorded for different configuration content.
pub fn verify_fingerprint(current: &str, baseline: &str, check: HashCheck) -> Result<(), DriftError> {
    match check {
        HashCheck::Skip => {
            warn!("skipping config hash verification");
            Ok(())
        }
        HashCheck::Enforce if current == baseline => {
            debug!("config hash matches");
            Ok(())
        }
        HashCheck::Enforce => Err(DriftError::FingerprintMismatch {
            current: current.to_string(),
            baseline: baseline.to_string(),
        }),
    }
}

pub fn diff(current: &[ServerStatus], baseline: &[ServerStatus]) -> Vec<Regression> {
    let mut out = Vec::new();
    for cur in current {
        for old in baseline.iter().filter(|old| old.same_endpoint(cur)) {
            if cur.status_code != old.status_code {
                out.push(Regression {
                    server_name: cur.server_name.clone(),
                    port: cur.port,
                    orig_status_code: old.status_code,
                    new_status_code: cur.status_code,
                    status_message: cur.status_message.clone(),
                });
            }
        }
    }
    debug!(current = current.len(), baseline = baseline.len(), regressions = out.len(), "diffed state");
    out
}
