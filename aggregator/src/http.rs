use crate::errors::BranchError;
use serde::de::DeserializeOwned;
use url::Url;

/// HTTP client shared by all branches.
///
/// Wraps a pooled `reqwest::Client`. Error messages identify the upstream by
/// host only, so credentials carried in the query string never leak into logs.
#[derive(Clone, Default)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Issues a GET against `url` with `query` appended and decodes the JSON body.
    ///
    /// Any non-2xx status is an error; the body of such a response is discarded.
    /// No timeout is applied here; callers bound the whole exchange.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T, BranchError> {
        let upstream_identifier = url.host_str().unwrap_or(url.path()).to_string();

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| {
                BranchError::Request(upstream_identifier.clone(), e.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BranchError::Status(upstream_identifier, status));
        }

        let body = response.bytes().await.map_err(|e| {
            BranchError::Request(upstream_identifier.clone(), e.without_url().to_string())
        })?;

        serde_json::from_slice(&body)
            .map_err(|e| BranchError::Decode(upstream_identifier, e.to_string()))
    }
}
