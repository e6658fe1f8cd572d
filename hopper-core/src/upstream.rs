use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{CandidatePage, PageRequest};

/// Trait for the remote server-listing endpoint.
#[async_trait]
pub trait ListingClient: Send + Sync {
    /// Fetch exactly one page. Retrying is the caller's concern.
    async fn fetch_page(&self, request: &PageRequest) -> Result<CandidatePage, FetchError>;
}

#[cfg(feature = "http")]
pub use http::HttpListingClient;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use reqwest::header::{HeaderMap, RETRY_AFTER};
    use reqwest::{StatusCode, Url};
    use std::time::Duration;

    use super::ListingClient;
    use crate::error::FetchError;
    use crate::types::{CandidatePage, PageRequest};

    /// `GET <url>?limit=..&sortOrder=Asc|Desc[&cursor=..]` against a JSON
    /// listing returning `{ "data": [...], "nextPageCursor": ... }`.
    #[derive(Debug, Clone)]
    pub struct HttpListingClient {
        url: Url,
        client: reqwest::Client,
    }

    impl HttpListingClient {
        pub fn new(url: &str) -> Result<Self, FetchError> {
            let url = Url::parse(url).map_err(|e| {
                FetchError::Transport(format!("invalid listing url '{}': {}", url, e))
            })?;
            Ok(Self {
                url,
                client: reqwest::Client::new(),
            })
        }

        pub fn with_client(mut self, client: reqwest::Client) -> Self {
            self.client = client;
            self
        }

        pub fn page_url(&self, request: &PageRequest) -> Url {
            let mut url = self.url.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("limit", &request.limit.to_string());
                query.append_pair("sortOrder", request.sort_order.as_query());
                if let Some(cursor) = request.cursor.as_deref().filter(|c| !c.is_empty()) {
                    query.append_pair("cursor", cursor);
                }
            }
            url
        }
    }

    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    #[async_trait]
    impl ListingClient for HttpListingClient {
        async fn fetch_page(&self, request: &PageRequest) -> Result<CandidatePage, FetchError> {
            let url = self.page_url(request);
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(FetchError::RateLimited {
                    retry_after: parse_retry_after(response.headers()),
                });
            }
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let body = response
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
        }
    }

}
