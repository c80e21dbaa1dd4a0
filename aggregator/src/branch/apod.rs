use crate::branch::{Branch, BranchContext, BranchOutput};
use crate::errors::BranchError;
use crate::http::UpstreamClient;
use crate::protocol::Dataset;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use url::Url;

/// Today's astronomy picture. Global, so the coordinate is ignored.
pub struct ApodBranch {
    client: UpstreamClient,
    url: Url,
}

impl ApodBranch {
    pub fn new(client: UpstreamClient, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Branch for ApodBranch {
    fn dataset(&self) -> Dataset {
        Dataset::Apod
    }

    async fn fetch(&self, context: &BranchContext) -> Result<BranchOutput, BranchError> {
        let query = [("api_key", context.api_key.as_str().to_string())];

        let picture: JsonValue = self.client.get_json(&self.url, &query).await?;
        Ok(BranchOutput::Apod(picture))
    }
}
