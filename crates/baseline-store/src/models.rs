use audit_core::ServerStatus;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Snapshot written by an index run and read back by a diff run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub config_hash: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub server_statuses: Vec<ServerStatus>,
}

impl Baseline {
    pub fn new(config_hash: impl Into<String>, server_statuses: Vec<ServerStatus>) -> Self {
        Baseline { created_at: OffsetDateTime::now_utc(), config_hash: config_hash.into(), server_statuses }
    }
}

// baselines written by older tooling carry `null` for an empty list
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ServerStatus>, D::Error> {
    Ok(Option::<Vec<ServerStatus>>::deserialize(d)?.unwrap_or_default())
}
