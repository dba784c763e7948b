//! Single-shot JSON GET over reqwest.
//!
//! One request per call. No retry and no backoff: any status other than
//! 200 is a [`StatError::Lookup`].

use std::time::Duration;

use crate::types::{QueryParams, StatError, StatResult};

/// Body of a 200 response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL including the encoded query string.
    pub url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn json(&self) -> StatResult<serde_json::Value> {
        tracing::debug!("decoding {} bytes from {}", self.body.len(), self.url);
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client shared by the REST connectors.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout_ms: u64) -> StatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("statpull/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` with `params` as the query string.
    pub async fn get(&self, url: &str, params: &QueryParams) -> StatResult<HttpResponse> {
        let resp = self
            .client
            .get(url)
            .query(&params.to_pairs())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        tracing::debug!("GET {final_url} -> {status}");

        if status != 200 {
            return Err(StatError::Lookup {
                status,
                url: final_url,
            });
        }

        let body = resp.text().await?;

        Ok(HttpResponse {
            url: final_url,
            body,
        })
    }

    /// GET and decode the body as JSON.
    pub async fn get_json(&self, url: &str, params: &QueryParams) -> StatResult<serde_json::Value> {
        self.get(url, params).await?.json()
    }
}
