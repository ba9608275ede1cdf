use crate::{classify, scheme_for_port, ProbeError, Prober};
use audit_core::{ServerStatus, StatusMessage};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Issues a GET per endpoint; the whole exchange (connect, TLS, headers) is bounded by the
/// client timeout. Redirects are followed with reqwest's default policy.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("vhost-audit/{}", audit_core::version()))
            .build()?;
        Ok(HttpProber { client })
    }

    /// GET `url` and record the outcome against (`server_name`, `port`).
    pub async fn probe_url(&self, server_name: &str, port: u16, url: &str) -> ServerStatus {
        debug!(url, "sending request");
        match self.client.get(url).send().await {
            Ok(resp) => ServerStatus::ok(server_name, port, resp.status().as_u16()),
            Err(e) => {
                let message = classify(&e);
                debug!(url, error = %e, status_message = %message, "server status check failed");
                ServerStatus::failed(server_name, port, message)
            }
        }
    }
}

impl Prober for HttpProber {
    async fn probe(&self, server_name: &str, port: u16) -> ServerStatus {
        let Some(scheme) = scheme_for_port(port) else {
            debug!(server_name, port, "no scheme for port");
            return ServerStatus::failed(server_name, port, StatusMessage::Unknown);
        };
        let url = format!("{}://{}:{}", scheme.as_str(), server_name, port);
        self.probe_url(server_name, port, &url).await
    }
}
