//! Upstream branches of the aggregation fan-out.
//!
//! Each branch fetches one dataset for a request. Branches are independent:
//! none reads another's result, and a failing branch only removes its own key
//! from the response. Adding a provider means adding a `Branch` impl and a
//! `BranchOutput` variant.

pub mod apod;
pub mod earth;
pub mod events;
pub mod mars;

use crate::config::{ApiKey, Config};
use crate::errors::BranchError;
use crate::http::UpstreamClient;
use crate::protocol::{Coordinate, Dataset};
use async_trait::async_trait;
use events::NaturalEvent;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Per-request inputs handed to every branch.
#[derive(Debug, Clone)]
pub struct BranchContext {
    pub coordinate: Coordinate,
    pub api_key: ApiKey,
}

/// Successful result of a branch, tagged by dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchOutput {
    Earth(JsonValue),
    Events(Vec<NaturalEvent>),
    Apod(JsonValue),
    Mars(JsonValue),
}

#[async_trait]
pub trait Branch: Send + Sync {
    fn dataset(&self) -> Dataset;

    /// Fetches (and filters, where applicable) this branch's dataset.
    async fn fetch(&self, context: &BranchContext) -> Result<BranchOutput, BranchError>;
}

/// Builds one branch per dataset from the configured upstreams.
pub fn build_branches(config: &Config, client: UpstreamClient) -> Vec<Arc<dyn Branch>> {
    let earth: Arc<dyn Branch> = Arc::new(earth::EarthBranch::new(
        client.clone(),
        config.upstreams.earth_url.clone(),
        config.earth.clone(),
    ));
    let events: Arc<dyn Branch> = Arc::new(events::EventsBranch::new(
        client.clone(),
        config.upstreams.events_url.clone(),
        config.events.clone(),
    ));
    let apod: Arc<dyn Branch> = Arc::new(apod::ApodBranch::new(
        client.clone(),
        config.upstreams.apod_url.clone(),
    ));
    let mars: Arc<dyn Branch> =
        Arc::new(mars::MarsBranch::new(client, config.upstreams.mars_url.clone()));

    vec![earth, events, apod, mars]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EarthConfig, EventsConfig, Listener, Upstreams};
    use std::collections::HashSet;

    #[test]
    fn test_one_branch_per_dataset() {
        let config = Config {
            listener: Listener {
                host: "127.0.0.1".into(),
                port: 3000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".into(),
                port: 3001,
            },
            api_key: None,
            branch_timeout_secs: 5,
            upstreams: Upstreams::default(),
            earth: EarthConfig::default(),
            events: EventsConfig::default(),
        };

        let branches = build_branches(&config, UpstreamClient::default());
        let datasets: HashSet<Dataset> = branches.iter().map(|b| b.dataset()).collect();

        assert_eq!(branches.len(), Dataset::ALL.len());
        assert_eq!(datasets, HashSet::from(Dataset::ALL));
    }
}
