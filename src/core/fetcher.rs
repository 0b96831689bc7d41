use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{WatchError, Result};

/// Retrieves the current raw body of a watched URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain HTTP GET, one attempt per call
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |message: String| WatchError::Fetch {
            url: url.to_string(),
            message,
        };

        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        // An error page must not replace a good baseline
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_err(format!("unreadable body: {}", e)))?;

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one GET with the given status line and body
    async fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
            }

            let head = format!(
                "HTTP/1.1 {}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/news", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig {
            timeout_secs: 5,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_exact_body() {
        let body: &[u8] = b"<html><body><div id=\"content\">caf\xc3\xa9\r\n</div></body></html>";
        let url = serve_once("200 OK", body).await;

        let fetched = fetcher().fetch(&url).await.unwrap();
        assert_eq!(fetched, body);
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() {
        let url = serve_once("404 Not Found", b"<html>gone</html>").await;

        let result = fetcher().fetch(&url).await;
        match result {
            Err(WatchError::Fetch { url: failed, message }) => {
                assert_eq!(failed, url);
                assert!(message.contains("404"));
            }
            other => panic!("expected a fetch error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = fetcher().fetch(&format!("http://{}/", addr)).await;
        assert!(matches!(result, Err(WatchError::Fetch { .. })));
    }
}
