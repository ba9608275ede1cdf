//! Shared data model for the vhost audit engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Ports that are probed; groups without one of them are dropped after extraction.
pub const WEB_PORTS: [i64; 2] = [80, 443];

/// Server names and listen ports taken from one `server { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EndpointGroup {
    pub names: BTreeSet<String>,
    pub ports: BTreeSet<i64>,
}

impl EndpointGroup {
    pub fn is_complete(&self) -> bool {
        !self.names.is_empty() && !self.ports.is_empty()
    }

    pub fn has_web_port(&self) -> bool {
        WEB_PORTS.iter().any(|p| self.ports.contains(p))
    }

    pub fn job_count(&self) -> usize {
        self.names.len() * self.ports.len()
    }
}

/// Classification of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusMessage {
    Ok,
    NoHost,
    ConnRefused,
    ConnReset,
    Timeout,
    FailedToVerifyCertificate,
    Unknown,
    /// Synthetic message for jobs that never reached the network.
    Invalid(String),
}

impl StatusMessage {
    pub fn as_str(&self) -> &str {
        match self {
            StatusMessage::Ok => "OK",
            StatusMessage::NoHost => "NO_HOST",
            StatusMessage::ConnRefused => "CONN_REFUSED",
            StatusMessage::ConnReset => "CONN_RESET",
            StatusMessage::Timeout => "TIMEOUT",
            StatusMessage::FailedToVerifyCertificate => "FAILED_TO_VERIFY_CERTIFICATE",
            StatusMessage::Unknown => "UNKNOWN",
            StatusMessage::Invalid(msg) => msg,
        }
    }
}

impl From<String> for StatusMessage {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OK" => StatusMessage::Ok,
            "NO_HOST" => StatusMessage::NoHost,
            "CONN_REFUSED" => StatusMessage::ConnRefused,
            "CONN_RESET" => StatusMessage::ConnReset,
            "TIMEOUT" => StatusMessage::Timeout,
            "FAILED_TO_VERIFY_CERTIFICATE" => StatusMessage::FailedToVerifyCertificate,
            "UNKNOWN" => StatusMessage::Unknown,
            _ => StatusMessage::Invalid(s),
        }
    }
}

impl From<StatusMessage> for String {
    fn from(m: StatusMessage) -> Self {
        match m {
            StatusMessage::Invalid(msg) => msg,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one (server name, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server_name: String,
    pub port: u16,
    #[serde(with = "status_code")]
    pub status_code: Option<u16>,
    pub status_message: StatusMessage,
}

impl ServerStatus {
    pub fn ok(server_name: impl Into<String>, port: u16, code: u16) -> Self {
        ServerStatus { server_name: server_name.into(), port, status_code: Some(code), status_message: StatusMessage::Ok }
    }

    pub fn failed(server_name: impl Into<String>, port: u16, message: StatusMessage) -> Self {
        ServerStatus { server_name: server_name.into(), port, status_code: None, status_message: message }
    }

    pub fn same_endpoint(&self, other: &ServerStatus) -> bool {
        self.server_name == other.server_name && self.port == other.port
    }
}

/// A status code that changed between the baseline and the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regression {
    pub server_name: String,
    pub port: u16,
    #[serde(with = "status_code")]
    pub orig_status_code: Option<u16>,
    #[serde(with = "status_code")]
    pub new_status_code: Option<u16>,
    pub status_message: StatusMessage,
}

/// Status code as the baseline stores it (`0` when absent).
pub fn code_or_zero(code: Option<u16>) -> u16 {
    code.unwrap_or(0)
}

// Baselines store a missing status code as 0.
mod status_code {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(code: &Option<u16>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u16(code.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
        let raw = u16::deserialize(d)?;
        Ok(if raw == 0 { None } else { Some(raw) })
    }
}
