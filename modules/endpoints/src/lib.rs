//! Line-oriented extraction of server names and listen ports from nginx-style configuration.
//!
//! Only two directives are recognized (`server_name` and `listen`). Blocks are tracked with
//! flat open/close cues, not a grammar: a `server {` line starts a fresh group and any line with
//! a `}` emits the group if it is complete. The group is not cleared on `}`, so a server block
//! that contains nested blocks may be emitted more than once; [`dedup_groups`] collapses the
//! repeats. Directives wrapped over several lines are not reconstructed.

use audit_core::EndpointGroup;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{self, BufRead};
use std::sync::OnceLock;
use tracing::debug;

const BLOCK_OPENER: &str = "server {";
const SENTINEL_NAMES: &[&str] = &["on", "_", "localhost"];

fn server_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"server_name\s+([^;]+);").expect("server_name pattern"))
}

fn listen_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"listen\s+([^;]+);").expect("listen pattern"))
}

/// Server names excluded by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList(BTreeSet<String>);

impl IgnoreList {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names = BTreeSet::new();
        for s in iter {
            let s: String = s.into();
            let s = s.trim();
            if !s.is_empty() {
                names.insert(s.to_string());
            }
        }
        IgnoreList(names)
    }
}

/// Parse a comma-separated ignore list (e.g., "a.example.com, b.example.com").
pub fn parse_ignore_list(list: &str) -> IgnoreList {
    list.split(',').collect()
}

/// Extract, deduplicate and keep only groups listening on 80 and/or 443.
pub fn extract(config: &str, ignore: &IgnoreList) -> Vec<EndpointGroup> {
    let mut raw = Vec::new();
    let mut current = EndpointGroup::default();
    for line in config.lines() {
        scan_line(line, ignore, &mut current, &mut raw);
    }
    finish(raw)
}

/// Same as [`extract`] but reads from a stream; read errors are returned to the caller.
pub fn extract_from_reader<R: BufRead>(reader: R, ignore: &IgnoreList) -> io::Result<Vec<EndpointGroup>> {
    let mut raw = Vec::new();
    let mut current = EndpointGroup::default();
    for line in reader.lines() {
        scan_line(&line?, ignore, &mut current, &mut raw);
    }
    Ok(finish(raw))
}

fn finish(raw: Vec<EndpointGroup>) -> Vec<EndpointGroup> {
    let found = raw.len();
    let unique = dedup_groups(raw);
    let unique_count = unique.len();
    let groups = filter_web_groups(unique);
    debug!(found, unique = unique_count, kept = groups.len(), "extracted endpoint groups");
    groups
}

fn scan_line(line: &str, ignore: &IgnoreList, current: &mut EndpointGroup, out: &mut Vec<EndpointGroup>) {
    if line.contains(BLOCK_OPENER) {
        *current = EndpointGroup::default();
    }
    if let Some(caps) = server_name_re().captures(line) {
        for name in caps[1].split_whitespace() {
            if SENTINEL_NAMES.contains(&name) || ignore.contains(name) {
                continue;
            }
            current.names.insert(name.to_string());
        }
    }
    if let Some(caps) = listen_re().captures(line) {
        // flags such as `ssl`, `http2` or `default_server` and address:port forms fall out here
        current.ports.extend(caps[1].split_whitespace().filter_map(|tok| tok.parse::<i64>().ok()));
    }
    if line.contains('}') && current.is_complete() {
        out.push(current.clone());
    }
}

/// Drop structurally equal groups, keeping the first occurrence.
pub fn dedup_groups(groups: Vec<EndpointGroup>) -> Vec<EndpointGroup> {
    let mut unique: Vec<EndpointGroup> = Vec::with_capacity(groups.len());
    for g in groups {
        if !unique.contains(&g) {
            unique.push(g);
        }
    }
    unique
}

/// Keep groups that listen on at least one of the probed ports.
pub fn filter_web_groups(groups: Vec<EndpointGroup>) -> Vec<EndpointGroup> {
    groups.into_iter().filter(EndpointGroup::has_web_port).collect()
}
