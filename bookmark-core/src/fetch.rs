//! Outbound HTTP for remote embeds.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Outcome of a content-type probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Lowercased MIME essence (`type/subtype`), empty when the server sent none
    pub mime: String,
}

impl Probe {
    pub fn major_type(&self) -> &str {
        self.mime.split('/').next().unwrap_or_default()
    }
}

/// Thin wrapper over a shared `reqwest` client with a per-request timeout
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bookmark/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Determine the content type of `url`.
    ///
    /// Sends a HEAD request first and falls back to GET when the server
    /// rejects HEAD or omits `Content-Type`.
    pub async fn probe(&self, url: &str) -> Result<Probe, FetchError> {
        let head = self.client.head(url).send().await;
        let response = match head {
            Ok(response) if response.status().is_success() && has_content_type(&response) => {
                response
            }
            _ => {
                debug!(url, "HEAD probe inconclusive, retrying with GET");
                checked(url, self.client.get(url).send().await?)?
            }
        };

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default();

        debug!(url, mime = %mime, "Probed remote content type");
        Ok(Probe { mime })
    }

    /// GET `url` and return its body as text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = checked(url, self.client.get(url).send().await?)?;
        let body = response.text().await?;
        debug!(url, bytes = body.len(), "Fetched remote document");
        Ok(body)
    }
}

fn has_content_type(response: &Response) -> bool {
    response.headers().contains_key(CONTENT_TYPE)
}

fn checked(url: &str, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
