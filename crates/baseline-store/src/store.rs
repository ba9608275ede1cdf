use crate::{Baseline, StoreError};
use audit_core::ServerStatus;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Where a baseline or configuration is read from / written to. `-` selects stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePath {
    Stdio,
    File(PathBuf),
}

impl StatePath {
    pub fn is_stdio(&self) -> bool {
        matches!(self, StatePath::Stdio)
    }
}

impl From<&str> for StatePath {
    fn from(s: &str) -> Self {
        if s == "-" { StatePath::Stdio } else { StatePath::File(PathBuf::from(s)) }
    }
}

impl From<PathBuf> for StatePath {
    fn from(p: PathBuf) -> Self {
        if p.as_os_str() == "-" { StatePath::Stdio } else { StatePath::File(p) }
    }
}

impl From<&Path> for StatePath {
    fn from(p: &Path) -> Self {
        p.to_path_buf().into()
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatePath::Stdio => f.write_str("-"),
            StatePath::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Read the whole input from a file or stdin. Bytes are returned as read; configuration files
/// are not required to be UTF-8.
pub fn read_input(path: &StatePath) -> Result<Vec<u8>, StoreError> {
    debug!(%path, "reading input");
    let read = match path {
        StatePath::Stdio => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf).map(|_| buf)
        }
        StatePath::File(p) => std::fs::read(p),
    };
    read.map_err(|source| StoreError::Read { path: path.clone(), source })
}

/// Build a baseline stamped with the current time and write it, replacing any previous one.
pub fn save(path: &StatePath, config_hash: &str, results: &[ServerStatus]) -> Result<Baseline, StoreError> {
    let baseline = Baseline::new(config_hash, results.to_vec());
    write(path, &baseline)?;
    Ok(baseline)
}

/// Serialize `baseline` to `path`. Files are written to a sibling temporary file and renamed
/// into place.
pub fn write(path: &StatePath, baseline: &Baseline) -> Result<(), StoreError> {
    let mut body = serde_json::to_vec_pretty(baseline).map_err(StoreError::Serialize)?;
    body.push(b'\n');
    let wrap = |source| StoreError::Write { path: path.clone(), source };
    match path {
        StatePath::Stdio => {
            let mut out = io::stdout().lock();
            out.write_all(&body).and_then(|_| out.flush()).map_err(wrap)?;
        }
        StatePath::File(p) => {
            let dir = match p.parent() {
                Some(d) if !d.as_os_str().is_empty() => d,
                _ => Path::new("."),
            };
            let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
            tmp.write_all(&body).map_err(wrap)?;
            tmp.persist(p).map_err(|e| wrap(e.error))?;
        }
    }
    debug!(%path, statuses = baseline.server_statuses.len(), "wrote baseline");
    Ok(())
}

pub fn load(path: &StatePath) -> Result<Baseline, StoreError> {
    let raw = read_input(path)?;
    let baseline: Baseline =
        serde_json::from_slice(&raw).map_err(|source| StoreError::Parse { path: path.clone(), source })?;
    debug!(%path, statuses = baseline.server_statuses.len(), "loaded baseline");
    Ok(baseline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::StatusMessage;

    fn results() -> Vec<ServerStatus> {
        vec![
            ServerStatus::ok("a.example.com", 443, 200),
            ServerStatus::failed("b.example.com", 80, StatusMessage::ConnRefused),
        ]
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = StatePath::File(dir.path().join("state.json"));
        let saved = save(&path, "abc123", &results()).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.config_hash, "abc123");
        assert_eq!(loaded.server_statuses, results());
        assert_eq!(loaded.created_at.unix_timestamp(), saved.created_at.unix_timestamp());
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = StatePath::File(dir.path().join("state.json"));
        save(&path, "first", &results()).unwrap();
        save(&path, "second", &[]).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.config_hash, "second");
        assert!(loaded.server_statuses.is_empty());
    }

    #[test]
    fn document_uses_expected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("state.json");
        save(&StatePath::File(p.clone()), "h", &results()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&p).unwrap()).unwrap();
        assert!(v["created_at"].as_str().unwrap().ends_with('Z'));
        assert_eq!(v["config_hash"], "h");
        let first = &v["server_statuses"][0];
        assert_eq!(first["server_name"], "a.example.com");
        assert_eq!(first["port"], 443);
        assert_eq!(first["status_code"], 200);
        assert_eq!(first["status_message"], "OK");
        assert_eq!(v["server_statuses"][1]["status_code"], 0);
    }

    #[test]
    fn loads_document_with_nanosecond_timestamp_and_null_list() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("old.json");
        std::fs::write(&p, r#"{"created_at":"2023-05-01T12:00:00.123456789Z","config_hash":"x","server_statuses":null}"#).unwrap();
        let b = load(&StatePath::File(p)).unwrap();
        assert_eq!(b.config_hash, "x");
        assert!(b.server_statuses.is_empty());
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&StatePath::File(dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.json");
        std::fs::write(&p, "not json").unwrap();
        let err = load(&StatePath::File(p)).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn input_need_not_be_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nginx.conf");
        let raw = b"# caf\xe9 comment\nserver {\n listen 80;\n server_name a.example.com;\n}\n";
        std::fs::write(&p, raw).unwrap();
        assert_eq!(read_input(&StatePath::File(p)).unwrap(), raw.to_vec());
    }

    #[test]
    fn dash_means_stdio() {
        assert!(StatePath::from("-").is_stdio());
        assert_eq!(StatePath::from("state.json"), StatePath::File(PathBuf::from("state.json")));
        assert_eq!(StatePath::from("-").to_string(), "-");
    }
}
