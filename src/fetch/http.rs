//! Blocking HTTP transport.
//!
//! A blocking request cannot be aborted while it waits for response headers;
//! that wait is bounded by `[http] timeout_secs`. Bodies are read in chunks
//! and abandoned as soon as the run is cancelled.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::FoldError;
use crate::fetch::{Response, Transport};
use crate::infra::config::HttpConfig;
use crate::infra::signal::CancelFlag;

const CHUNK: usize = 64 * 1024;

/// [`Transport`] over a shared `reqwest` blocking client.
#[derive(Debug, Clone)]
pub struct HttpTransport
{
    client: Client,
    max_body_bytes: u64,
}

impl HttpTransport
{
    /// Build the client from the `[http]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(cfg: &HttpConfig) -> anyhow::Result<Self>
    {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.clamp(1, 30)))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(&cfg.user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self { client, max_body_bytes: cfg.max_body_bytes })
    }
}

impl Transport for HttpTransport
{
    fn get(
        &self,
        url: &Url,
        cancel: &CancelFlag,
    ) -> Result<Response, FoldError>
    {
        let fail = |reason: String| FoldError::Fetch { target: url.to_string(), reason };

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| fail(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success()
        {
            return Err(fail(format!("HTTP {status}")));
        }

        let final_url = response
            .url()
            .clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| {
                v.to_str()
                    .ok()
            })
            .map(str::to_string);

        let body = read_body(response, self.max_body_bytes, cancel).map_err(|e| match e
        {
            FoldError::Fetch { reason, .. } => fail(reason),
            other => other,
        })?;

        Ok(Response { final_url, content_type, body })
    }
}

/// Read at most `cap` bytes, checking `cancel` between chunks.
fn read_body(
    reader: impl Read,
    cap: u64,
    cancel: &CancelFlag,
) -> Result<Vec<u8>, FoldError>
{
    let fail = |reason: String| FoldError::Fetch { target: String::new(), reason };

    // One byte past the cap tells "exactly at limit" from "over"
    let mut limited = reader.take(cap + 1);
    let mut body = Vec::new();
    let mut chunk = vec![0u8; CHUNK];
    loop
    {
        cancel.check()?;
        let n = limited
            .read(&mut chunk)
            .map_err(|e| fail(format!("failed to read body: {e}")))?;
        if n == 0
        {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    if body.len() as u64 > cap
    {
        return Err(fail(format!("body exceeds {cap} bytes")));
    }
    Ok(body)
}
