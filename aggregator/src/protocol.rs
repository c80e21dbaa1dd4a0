//! Request and response types of the aggregation endpoint.
//!
//! # Request
//! ```json
//! { "lat": 37.77, "lon": -122.42, "dataType": "all" }
//! ```
//!
//! # Response
//! ```json
//! {
//!   "success": true,
//!   "coordinates": { "lat": 37.77, "lon": -122.42 },
//!   "data": { "events": [...], "apod": {...} },
//!   "timestamp": "2024-05-01T12:00:00.000Z"
//! }
//! ```
//!
//! A key in `data` is present only when its branch was selected and succeeded.

use crate::branch::BranchOutput;
use crate::branch::events::NaturalEvent;
use crate::errors::AggregatorError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A validated point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lon")]
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AggregatorError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AggregatorError::InvalidCoordinate(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AggregatorError::InvalidCoordinate(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Coordinate {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// One of the upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Earth,
    Events,
    Apod,
    Mars,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [Dataset::Earth, Dataset::Events, Dataset::Apod, Dataset::Mars];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Dataset::Earth => "earth",
            Dataset::Events => "events",
            Dataset::Apod => "apod",
            Dataset::Mars => "mars",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `dataType` field of a request.
///
/// Anything other than a known dataset name or `"all"` selects nothing, which
/// yields a successful response with empty `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSelector {
    Only(Dataset),
    All,
    Unrecognized,
}

impl DatasetSelector {
    pub fn parse(value: &str) -> Self {
        match value {
            "all" => DatasetSelector::All,
            other => Dataset::ALL
                .into_iter()
                .find(|dataset| dataset.as_str() == other)
                .map_or(DatasetSelector::Unrecognized, DatasetSelector::Only),
        }
    }

    pub fn includes(&self, dataset: Dataset) -> bool {
        match self {
            DatasetSelector::Only(selected) => *selected == dataset,
            DatasetSelector::All => true,
            DatasetSelector::Unrecognized => false,
        }
    }
}

impl Default for DatasetSelector {
    fn default() -> Self {
        DatasetSelector::Only(Dataset::Earth)
    }
}

impl<'de> Deserialize<'de> for DatasetSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Non-string values (including null) are tolerated and select nothing
        let value = JsonValue::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map_or(DatasetSelector::Unrecognized, DatasetSelector::parse))
    }
}

#[derive(Deserialize)]
struct RawRequest {
    lat: f64,
    lon: f64,
    #[serde(rename = "dataType", default)]
    data_type: DatasetSelector,
}

/// A parsed and validated aggregation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateRequest {
    pub coordinate: Coordinate,
    pub selector: DatasetSelector,
}

impl AggregateRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, AggregatorError> {
        let value: JsonValue = serde_json::from_slice(body)
            .map_err(|e| AggregatorError::InvalidRequest(e.to_string()))?;
        if !value.is_object() {
            return Err(AggregatorError::InvalidRequest(
                "expected a JSON object".to_string(),
            ));
        }

        let raw: RawRequest = serde_json::from_value(value)
            .map_err(|e| AggregatorError::InvalidRequest(e.to_string()))?;

        Ok(AggregateRequest {
            coordinate: Coordinate::new(raw.lat, raw.lon)?,
            selector: raw.data_type,
        })
    }
}

/// Payloads of the branches that succeeded.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ProviderData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earth: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<NaturalEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apod: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mars: Option<JsonValue>,
}

impl ProviderData {
    pub fn from_outputs(outputs: impl IntoIterator<Item = BranchOutput>) -> Self {
        outputs
            .into_iter()
            .fold(ProviderData::default(), |data, output| match output {
                BranchOutput::Earth(earth) => ProviderData {
                    earth: Some(earth),
                    ..data
                },
                BranchOutput::Events(events) => ProviderData {
                    events: Some(events),
                    ..data
                },
                BranchOutput::Apod(apod) => ProviderData {
                    apod: Some(apod),
                    ..data
                },
                BranchOutput::Mars(mars) => ProviderData {
                    mars: Some(mars),
                    ..data
                },
            })
    }

    /// Datasets present in this response, in declaration order.
    pub fn datasets(&self) -> Vec<Dataset> {
        let present = [
            self.earth.is_some(),
            self.events.is_some(),
            self.apod.is_some(),
            self.mars.is_some(),
        ];
        Dataset::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(dataset, is_present)| is_present.then_some(dataset))
            .collect()
    }
}

/// Envelope returned when the request as a whole succeeded, however many
/// branches contributed to it.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    success: bool,
    pub coordinates: Coordinate,
    pub data: ProviderData,
    pub timestamp: String,
}

impl AggregateResponse {
    pub fn new(coordinates: Coordinate, data: ProviderData) -> Self {
        AggregateResponse {
            success: true,
            coordinates,
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Envelope returned when the request failed outright.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    success: bool,
    pub error: String,
}

impl From<&AggregatorError> for ErrorResponse {
    fn from(error: &AggregatorError) -> Self {
        ErrorResponse {
            success: false,
            error: error.to_string(),
        }
    }
}
