use crate::branch::{Branch, BranchContext, BranchOutput};
use crate::config::EarthConfig;
use crate::errors::BranchError;
use crate::http::UpstreamClient;
use crate::protocol::Dataset;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use url::Url;

/// Low-resolution imagery record for the requested coordinate, taken at a
/// fixed reference date.
pub struct EarthBranch {
    client: UpstreamClient,
    url: Url,
    params: EarthConfig,
}

impl EarthBranch {
    pub fn new(client: UpstreamClient, url: Url, params: EarthConfig) -> Self {
        Self {
            client,
            url,
            params,
        }
    }
}

#[async_trait]
impl Branch for EarthBranch {
    fn dataset(&self) -> Dataset {
        Dataset::Earth
    }

    async fn fetch(&self, context: &BranchContext) -> Result<BranchOutput, BranchError> {
        let query = [
            ("lon", context.coordinate.longitude().to_string()),
            ("lat", context.coordinate.latitude().to_string()),
            ("date", self.params.date.format("%Y-%m-%d").to_string()),
            ("dim", self.params.dim.to_string()),
            ("api_key", context.api_key.as_str().to_string()),
        ];

        let imagery: JsonValue = self.client.get_json(&self.url, &query).await?;
        Ok(BranchOutput::Earth(imagery))
    }
}
