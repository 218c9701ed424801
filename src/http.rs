use crate::{config::CrawlSettings, error::TransportError, CrawlerError};
use clap::ValueEnum;
use reqwest::{header, Client};
use url::Url;

/// Content-encoding negotiation. Purely a bandwidth concern, the decoded body is
/// the same either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    None,
    /// gzip and deflate
    Gzip,
    /// brotli, plus gzip and deflate as fallbacks
    Brotli,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Compressed size when the server reports it.
    pub content_length: Option<u64>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
            content_length: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Bytes counted toward download statistics.
    pub fn downloaded_bytes(&self) -> u64 {
        self.content_length.unwrap_or(self.body.len() as u64)
    }
}

#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(settings: &CrawlSettings) -> Result<Self, CrawlerError> {
        let (gzip, brotli) = match settings.compression {
            Compression::None => (false, false),
            Compression::Gzip => (true, false),
            Compression::Brotli => (true, true),
        };

        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .gzip(gzip)
            .deflate(gzip)
            .brotli(brotli)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(ReqwestClient { client })
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            body,
            content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloaded_bytes_prefers_content_length() {
        let mut response = HttpResponse::new(200, "hello");
        assert_eq!(response.downloaded_bytes(), 5);
        response.content_length = Some(3);
        assert_eq!(response.downloaded_bytes(), 3);
    }

    #[test]
    fn test_client_builds_for_every_compression() {
        for compression in [Compression::None, Compression::Gzip, Compression::Brotli] {
            let settings = CrawlSettings {
                compression,
                ..CrawlSettings::default()
            };
            assert!(ReqwestClient::new(&settings).is_ok());
        }
    }
}
