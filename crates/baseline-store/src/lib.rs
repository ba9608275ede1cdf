//! Persistence of probe baselines as a single JSON document.

mod fingerprint;
mod models;
mod store;

pub use fingerprint::fingerprint;
pub use models::Baseline;
pub use store::{load, read_input, save, write, StatePath};

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: StatePath,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: StatePath,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse baseline {path}: {source}")]
    Parse {
        path: StatePath,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize baseline: {0}")]
    Serialize(#[source] serde_json::Error),
}
