//! Fetches feed snapshots over HTTP

use std::time::Duration;

use anyhow::Context;
use log::debug;
use reqwest::blocking::Client;

use pews::Fetch;

/// Blocking HTTP client for the PEWS feeds
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// New client; each request fails after `timeout`
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pewsdec/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("unable to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    type Error = reqwest::Error;

    fn fetch(&mut self, url: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            debug!("HTTP {} from {}", status, url);
            return Ok(None);
        }

        Ok(Some(resp.bytes()?.to_vec()))
    }
}
