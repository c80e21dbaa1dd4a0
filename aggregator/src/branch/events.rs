//! Natural events near the requested coordinate.
//!
//! The feed is global: the most recent events of the last few days are
//! fetched regardless of location, then filtered locally with a per-axis
//! bounding box (not great-circle distance) around the request coordinate.

use crate::branch::{Branch, BranchContext, BranchOutput};
use crate::config::EventsConfig;
use crate::errors::BranchError;
use crate::http::UpstreamClient;
use crate::protocol::{Coordinate, Dataset};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCategory {
    pub title: String,

    /// Other fields (`id`, future fields), passed through as-is.
    #[serde(flatten)]
    pub extra_fields: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGeometry {
    /// `[lon, lat]` for point geometries, nested rings for polygons.
    pub coordinates: JsonValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(flatten)]
    pub extra_fields: Map<String, JsonValue>,
}

impl EventGeometry {
    /// Returns `(lon, lat)` when this geometry is a point.
    pub fn point(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_array()?.as_slice() {
            [lon, lat, ..] => Some((lon.as_f64()?, lat.as_f64()?)),
            _ => None,
        }
    }
}

/// One record of the natural events feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaturalEvent {
    pub id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<EventCategory>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub geometries: Vec<EventGeometry>,

    /// Other fields (`link`, `sources`, future fields), passed through as-is.
    #[serde(flatten)]
    pub extra_fields: Map<String, JsonValue>,
}

impl NaturalEvent {
    /// Whether the first geometry lies within `radius_degrees` of `origin` on
    /// both axes. Events without a point geometry are never near anything.
    pub fn is_near(&self, origin: &Coordinate, radius_degrees: f64) -> bool {
        let Some((lon, lat)) = self.geometries.first().and_then(EventGeometry::point) else {
            return false;
        };

        (lat - origin.latitude()).abs() <= radius_degrees
            && (lon - origin.longitude()).abs() <= radius_degrees
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Records are kept raw so that one malformed event cannot fail the whole feed.
#[derive(Debug, Deserialize)]
struct EventsFeed {
    events: Vec<JsonValue>,
}

/// Decodes each feed record on its own, skipping the ones that do not parse.
fn decode_events(records: Vec<JsonValue>) -> Vec<NaturalEvent> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed natural event");
                None
            }
        })
        .collect()
}

/// Keeps the events whose first geometry falls in the bounding box around `origin`.
pub fn filter_nearby(
    events: Vec<NaturalEvent>,
    origin: &Coordinate,
    radius_degrees: f64,
) -> Vec<NaturalEvent> {
    events
        .into_iter()
        .filter(|event| event.is_near(origin, radius_degrees))
        .collect()
}

pub struct EventsBranch {
    client: UpstreamClient,
    url: Url,
    params: EventsConfig,
}

impl EventsBranch {
    pub fn new(client: UpstreamClient, url: Url, params: EventsConfig) -> Self {
        Self {
            client,
            url,
            params,
        }
    }
}

#[async_trait]
impl Branch for EventsBranch {
    fn dataset(&self) -> Dataset {
        Dataset::Events
    }

    async fn fetch(&self, context: &BranchContext) -> Result<BranchOutput, BranchError> {
        // The feed is public; the credential is not sent
        let query = [
            ("limit", self.params.limit.to_string()),
            ("days", self.params.days.to_string()),
        ];

        let feed: EventsFeed = self.client.get_json(&self.url, &query).await?;
        let total = feed.events.len();
        let events = decode_events(feed.events);
        let skipped = total - events.len();
        let nearby = filter_nearby(events, &context.coordinate, self.params.radius_degrees);

        tracing::debug!(total, skipped, nearby = nearby.len(), "Filtered natural events");
        Ok(BranchOutput::Events(nearby))
    }
}
