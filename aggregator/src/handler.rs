use crate::branch::{BranchContext, build_branches};
use crate::config::{ApiKey, Config};
use crate::errors::AggregatorError;
use crate::executor::{Executor, collect_outputs};
use crate::http::UpstreamClient;
use crate::protocol::{AggregateRequest, AggregateResponse, ProviderData};
use std::time::Duration;

/// Turns one request body into one envelope.
///
/// The upstream credential is injected at construction. Without it every
/// request fails before any branch runs.
pub struct AggregateHandler {
    api_key: Option<ApiKey>,
    executor: Executor,
}

impl AggregateHandler {
    pub fn new(executor: Executor, api_key: Option<ApiKey>) -> Self {
        Self { api_key, executor }
    }

    pub fn from_config(config: &Config, api_key: Option<ApiKey>) -> Self {
        let client = UpstreamClient::new(reqwest::Client::new());
        let executor = Executor::new(
            build_branches(config, client),
            Duration::from_secs(config.branch_timeout_secs),
        );
        Self::new(executor, api_key)
    }

    pub fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn aggregate(&self, body: &[u8]) -> Result<AggregateResponse, AggregatorError> {
        let request = AggregateRequest::from_slice(body)?;
        let api_key = self
            .api_key
            .clone()
            .ok_or(AggregatorError::MissingApiKey)?;

        tracing::info!(
            lat = request.coordinate.latitude(),
            lon = request.coordinate.longitude(),
            selector = ?request.selector,
            "Fetching data for coordinates"
        );

        let context = BranchContext {
            coordinate: request.coordinate,
            api_key,
        };
        let results = self.executor.execute(request.selector, context).await;
        let data = ProviderData::from_outputs(collect_outputs(results));

        tracing::info!(datasets = ?data.datasets(), "Data fetched");
        Ok(AggregateResponse::new(request.coordinate, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EarthConfig, EventsConfig, Listener, Upstreams};
    use crate::protocol::Dataset;
    use crate::testutils::{MockResponse, MockUpstream};
    use hyper::StatusCode;
    use serde_json::{Value, json};

    const EARTH_PATH: &str = "/planetary/earth/imagery";
    const EVENTS_PATH: &str = "/api/v2.1/events";
    const APOD_PATH: &str = "/planetary/apod";
    const MARS_PATH: &str = "/insight_weather/";

    fn events_feed() -> Value {
        json!({
            "events": [
                {
                    "id": "EONET_1",
                    "title": "Near",
                    "categories": [{"id": 8, "title": "Wildfires"}],
                    "geometries": [{"date": "2024-05-01T00:00:00Z", "coordinates": [10.0, 10.0]}]
                },
                {
                    "id": "EONET_2",
                    "title": "Far",
                    "categories": [{"id": 8, "title": "Wildfires"}],
                    "geometries": [{"date": "2024-05-01T00:00:00Z", "coordinates": [20.0, 20.0]}]
                },
                {
                    "id": "EONET_3",
                    "title": "Nowhere",
                    "categories": [],
                    "geometries": []
                }
            ]
        })
    }

    fn healthy_routes() -> Vec<(&'static str, MockResponse)> {
        vec![
            (EARTH_PATH, MockResponse::json(json!({"url": "https://example.com/tile.png"}))),
            (EVENTS_PATH, MockResponse::json(events_feed())),
            (APOD_PATH, MockResponse::json(json!({"title": "Horsehead Nebula"}))),
            (MARS_PATH, MockResponse::json(json!({"sol_keys": []}))),
        ]
    }

    fn upstreams_for(upstream: &MockUpstream) -> Upstreams {
        Upstreams {
            earth_url: upstream.url(EARTH_PATH),
            events_url: upstream.url(EVENTS_PATH),
            apod_url: upstream.url(APOD_PATH),
            mars_url: upstream.url(MARS_PATH),
        }
    }

    fn handler_with(upstreams: Upstreams, api_key: Option<&str>) -> AggregateHandler {
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
            branch_timeout_secs: 1,
            upstreams,
            earth: EarthConfig::default(),
            events: EventsConfig::default(),
        };
        AggregateHandler::from_config(&config, api_key.and_then(ApiKey::new))
    }

    fn handler_for(upstream: &MockUpstream, api_key: Option<&str>) -> AggregateHandler {
        handler_with(upstreams_for(upstream), api_key)
    }

    fn data_keys(response: &AggregateResponse) -> Vec<String> {
        let body = serde_json::to_value(response).unwrap();
        body["data"].as_object().unwrap().keys().cloned().collect()
    }

    #[tokio::test]
    async fn test_all_datasets() {
        let upstream = MockUpstream::start(healthy_routes()).await;
        let handler = handler_for(&upstream, Some("DEMO_KEY"));

        let response = handler
            .aggregate(br#"{"lat": 11, "lon": 11, "dataType": "all"}"#)
            .await
            .unwrap();

        assert_eq!(response.data.datasets(), Dataset::ALL.to_vec());
        let events = response.data.events.as_ref().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "EONET_1");
        assert_eq!(upstream.hits(), 4);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["coordinates"], json!({"lat": 11.0, "lon": 11.0}));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_single_dataset_only_returns_that_key() {
        let upstream = MockUpstream::start(healthy_routes()).await;
        let handler = handler_for(&upstream, Some("DEMO_KEY"));

        for dataset in Dataset::ALL {
            let body = format!(r#"{{"lat": 11, "lon": 11, "dataType": "{dataset}"}}"#);
            let response = handler.aggregate(body.as_bytes()).await.unwrap();
            assert_eq!(data_keys(&response), vec![dataset.to_string()]);
        }
        assert_eq!(upstream.hits(), 4);
    }

    #[tokio::test]
    async fn test_default_dataset_is_earth() {
        let upstream = MockUpstream::start(healthy_routes()).await;
        let handler = handler_for(&upstream, Some("DEMO_KEY"));

        let response = handler.aggregate(br#"{"lat": 1, "lon": 2}"#).await.unwrap();

        assert_eq!(data_keys(&response), vec!["earth"]);
    }

    #[tokio::test]
    async fn test_unrecognized_dataset_yields_empty_data() {
        let upstream = MockUpstream::start(healthy_routes()).await;
        let handler = handler_for(&upstream, Some("DEMO_KEY"));

        let response = handler
            .aggregate(br#"{"lat": 1, "lon": 2, "dataType": "heatmap"}"#)
            .await
            .unwrap();

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"], json!({}));
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_still_succeeds() {
        let upstream = MockUpstream::start([
            (EVENTS_PATH, MockResponse::status(StatusCode::BAD_GATEWAY)),
            (APOD_PATH, MockResponse::json(json!({"title": "Horsehead Nebula"}))),
            (MARS_PATH, MockResponse::raw("not json")),
            // Slower than the 1s branch timeout
            (
                EARTH_PATH,
                MockResponse::json(json!({})).delayed(Duration::from_secs(3)),
            ),
        ])
        .await;
        let handler = handler_for(&upstream, Some("DEMO_KEY"));

        let response = handler
            .aggregate(br#"{"lat": 11, "lon": 11, "dataType": "all"}"#)
            .await
            .unwrap();

        assert_eq!(data_keys(&response), vec!["apod"]);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["apod"]["title"], "Horsehead Nebula");
    }

    #[tokio::test]
    async fn test_unreachable_events_feed_omits_events() {
        let upstream = MockUpstream::start([(
            APOD_PATH,
            MockResponse::json(json!({"title": "Horsehead Nebula"})),
        )])
        .await;

        // Point the events branch at a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = listener.local_addr().unwrap().port();
        drop(listener);

        let upstreams = Upstreams {
            events_url: url::Url::parse(&format!("http://127.0.0.1:{dead_port}/events")).unwrap(),
            ..upstreams_for(&upstream)
        };
        let handler = handler_with(upstreams, Some("DEMO_KEY"));

        let response = handler
            .aggregate(br#"{"lat": 11, "lon": 11, "dataType": "all"}"#)
            .await
            .unwrap();

        let keys = data_keys(&response);
        assert!(keys.contains(&"apod".to_string()));
        assert!(!keys.contains(&"events".to_string()));
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_upstream_calls() {
        let upstream = MockUpstream::start(healthy_routes()).await;
        let handler = handler_for(&upstream, None);
        assert!(!handler.is_ready());

        let result = handler
            .aggregate(br#"{"lat": 11, "lon": 11, "dataType": "all"}"#)
            .await;

        assert!(matches!(result, Err(AggregatorError::MissingApiKey)));
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_upstream_calls() {
        let upstream = MockUpstream::start(healthy_routes()).await;
        let handler = handler_for(&upstream, Some("DEMO_KEY"));

        assert!(matches!(
            handler.aggregate(br#"{"lon": 11, "dataType": "all"}"#).await,
            Err(AggregatorError::InvalidRequest(_))
        ));
        assert!(matches!(
            handler
                .aggregate(br#"{"lat": -91, "lon": 11, "dataType": "all"}"#)
                .await,
            Err(AggregatorError::InvalidCoordinate(_))
        ));
        assert_eq!(upstream.hits(), 0);
    }
}
