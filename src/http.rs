//! Outbound HTTP. Everything that talks to the network goes through
//! [Transport], so the resolver and fetcher can be tested without one.

use anyhow::Context;
use log::debug;
use std::time::Duration;

/// Something that can GET a URL and hand back the body
pub trait Transport: Send + Sync {
    /// Fetch the body of a URL. Any non-2xx status is an error.
    fn get(&self, url: &str) -> anyhow::Result<String>;
}

/// The real transport, backed by a [ureq::Agent]
#[derive(Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("city-weather/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> anyhow::Result<String> {
        debug!("GET {}", redact(url));
        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(code, _) => {
                anyhow::anyhow!("HTTP {code} from {}", redact(url))
            }
            ureq::Error::Transport(transport) => {
                // The transport error's Display includes the full URL
                anyhow::anyhow!(
                    "Error requesting {}: {}",
                    redact(url),
                    transport.kind()
                )
            }
        })?;
        response
            .into_string()
            .with_context(|| format!("Error reading body from {}", redact(url)))
    }
}

/// Strip the query string from a URL so API keys don't end up in the logs
pub fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
pub use mock::MockTransport;
