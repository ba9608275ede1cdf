//! HTTP(S) reachability probing of extracted endpoints with a fixed-size worker pool.

mod classify;
mod http;
mod pool;

pub use classify::classify;
pub use http::HttpProber;
pub use pool::run_pool;

use audit_core::{EndpointGroup, ServerStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions { concurrency: DEFAULT_CONCURRENCY, timeout: DEFAULT_TIMEOUT }
    }
}

/// One (server name, port) pair to check. The port is kept as extracted and narrowed to `u16`
/// only when the job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeJob {
    pub server_name: String,
    pub port: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

pub fn scheme_for_port(port: u16) -> Option<Scheme> {
    match port {
        80 => Some(Scheme::Http),
        443 => Some(Scheme::Https),
        _ => None,
    }
}

/// Performs the check for a single endpoint. Failures are reported in the returned status.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, server_name: &str, port: u16) -> impl Future<Output = ServerStatus> + Send;
}

pub fn total_jobs(groups: &[EndpointGroup]) -> usize {
    groups.iter().map(EndpointGroup::job_count).sum()
}

/// Flatten every group into the cartesian product of its names and ports.
pub fn expand_jobs(groups: &[EndpointGroup]) -> Vec<ProbeJob> {
    let mut jobs = Vec::with_capacity(total_jobs(groups));
    for g in groups {
        for name in &g.names {
            for &port in &g.ports {
                jobs.push(ProbeJob { server_name: name.clone(), port });
            }
        }
    }
    jobs
}

/// Probe every endpoint of `groups` with `opts.concurrency` workers. Results come back
/// unordered, one per (name, port) pair.
pub async fn probe<P: Prober>(prober: Arc<P>, groups: &[EndpointGroup], opts: &ProbeOptions) -> Vec<ServerStatus> {
    run_pool(prober, expand_jobs(groups), opts.concurrency).await
}
