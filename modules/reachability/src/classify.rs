use audit_core::StatusMessage;
use std::error::Error;
use std::io;

/// Map a failed request to a classification by walking its source chain.
///
/// Precedence when several causes are present: timeout, refused, unresolved host,
/// certificate, reset.
pub fn classify(err: &reqwest::Error) -> StatusMessage {
    if err.is_timeout() {
        return StatusMessage::Timeout;
    }
    let mut seen = Causes::default();
    seen.walk(err);
    seen.message()
}

#[derive(Default)]
struct Causes {
    timeout: bool,
    refused: bool,
    no_host: bool,
    certificate: bool,
    reset: bool,
}

impl Causes {
    /// Visit `err` and everything beneath it. Connectors nest `io::Error`s several layers deep
    /// and `io::Error::source` skips the wrapped error, so each layer is unwrapped by hand.
    fn walk(&mut self, err: &(dyn Error + 'static)) {
        let mut cur = Some(err);
        while let Some(e) = cur {
            self.inspect(e);
            cur = match e.downcast_ref::<io::Error>().and_then(|io_err| io_err.get_ref()) {
                Some(inner) => Some(inner as &(dyn Error + 'static)),
                None => e.source(),
            };
        }
    }

    fn inspect(&mut self, e: &(dyn Error + 'static)) {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => self.timeout = true,
                io::ErrorKind::ConnectionRefused => self.refused = true,
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => self.reset = true,
                _ => {}
            }
        }
        if is_certificate_error(e) {
            self.certificate = true;
        }
        // hyper-util wraps resolver failures in a private error type
        let msg = e.to_string();
        if msg.starts_with("dns error") || msg.starts_with("failed to lookup address") {
            self.no_host = true;
        }
    }

    fn message(&self) -> StatusMessage {
        if self.timeout {
            StatusMessage::Timeout
        } else if self.refused {
            StatusMessage::ConnRefused
        } else if self.no_host {
            StatusMessage::NoHost
        } else if self.certificate {
            StatusMessage::FailedToVerifyCertificate
        } else if self.reset {
            StatusMessage::ConnReset
        } else {
            StatusMessage::Unknown
        }
    }
}

fn is_certificate_error(e: &(dyn Error + 'static)) -> bool {
    matches!(e.downcast_ref::<rustls::Error>(), Some(rustls::Error::InvalidCertificate(_)))
}
