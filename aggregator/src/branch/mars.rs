use crate::branch::{Branch, BranchContext, BranchOutput};
use crate::errors::BranchError;
use crate::http::UpstreamClient;
use crate::protocol::Dataset;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use url::Url;

const FEED_TYPE: &str = "json";
const FEED_VERSION: &str = "1.0";

/// Latest multi-sol weather summary from the lander's instrument feed.
pub struct MarsBranch {
    client: UpstreamClient,
    url: Url,
}

impl MarsBranch {
    pub fn new(client: UpstreamClient, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Branch for MarsBranch {
    fn dataset(&self) -> Dataset {
        Dataset::Mars
    }

    async fn fetch(&self, context: &BranchContext) -> Result<BranchOutput, BranchError> {
        let query = [
            ("api_key", context.api_key.as_str().to_string()),
            ("feedtype", FEED_TYPE.to_string()),
            ("ver", FEED_VERSION.to_string()),
        ];

        let weather: JsonValue = self.client.get_json(&self.url, &query).await?;
        Ok(BranchOutput::Mars(weather))
    }
}
