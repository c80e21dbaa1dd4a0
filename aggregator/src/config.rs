use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV_VAR: &str = "NASA_API_KEY";

/// The upstream API returns at most this many events per page.
const MAX_EVENT_LIMIT: u32 = 20;

const DEFAULT_EARTH_URL: &str = "https://api.nasa.gov/planetary/earth/imagery";
const DEFAULT_EVENTS_URL: &str = "https://eonet.gsfc.nasa.gov/api/v2.1/events";
const DEFAULT_APOD_URL: &str = "https://api.nasa.gov/planetary/apod";
const DEFAULT_MARS_URL: &str = "https://api.nasa.gov/insight_weather/";

const DEFAULT_EARTH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2023, 1, 1) {
    Some(date) => date,
    None => panic!("default imagery date is not a calendar date"),
};

static DEFAULT_UPSTREAMS: LazyLock<Upstreams> = LazyLock::new(|| {
    let parse = |s: &str| Url::parse(s).expect("default upstream URL is valid");
    Upstreams {
        earth_url: parse(DEFAULT_EARTH_URL),
        events_url: parse(DEFAULT_EVENTS_URL),
        apod_url: parse(DEFAULT_APOD_URL),
        mars_url: parse(DEFAULT_MARS_URL),
    }
});

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Branch timeout cannot be 0")]
    InvalidTimeout,

    #[error("Event limit must be between 1 and 20, got {0}")]
    InvalidEventLimit(u32),

    #[error("Event window cannot be 0 days")]
    InvalidEventDays,

    #[error("Event radius must be a positive number of degrees, got {0}")]
    InvalidRadius(f64),

    #[error("Imagery dimension must be a positive number of degrees, got {0}")]
    InvalidDim(f64),
}

/// Shared credential for the upstream APIs.
///
/// The value never appears in `Debug` output or logs.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        match key.trim().is_empty() {
            true => None,
            false => Some(ApiKey(key)),
        }
    }

    /// Picks the configured key, falling back to `from_env`. Blank values count as absent.
    pub fn resolve(configured: Option<ApiKey>, from_env: Option<String>) -> Option<Self> {
        configured
            .and_then(|key| ApiKey::new(key.0))
            .or_else(|| from_env.and_then(ApiKey::new))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Aggregator configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    pub admin_listener: Listener,
    /// Upstream credential. When absent, `NASA_API_KEY` is consulted at startup.
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    /// Upper bound on a single branch fetch, including reading the body
    #[serde(default = "default_branch_timeout_secs")]
    pub branch_timeout_secs: u64,
    #[serde(default)]
    pub upstreams: Upstreams,
    #[serde(default)]
    pub earth: EarthConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

fn default_branch_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Validates the aggregator configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.branch_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        self.earth.validate()?;
        self.events.validate()?;

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Base URLs of the upstream providers.
///
/// Note: Uses the `url::Url` type so that invalid URLs are rejected during
/// config deserialization.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Upstreams {
    pub earth_url: Url,
    pub events_url: Url,
    pub apod_url: Url,
    pub mars_url: Url,
}

impl Default for Upstreams {
    fn default() -> Self {
        DEFAULT_UPSTREAMS.clone()
    }
}

/// Parameters of the imagery lookup
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EarthConfig {
    /// Reference date of the requested image
    pub date: NaiveDate,
    /// Width and height of the image in degrees
    pub dim: f64,
}

impl Default for EarthConfig {
    fn default() -> Self {
        EarthConfig {
            date: DEFAULT_EARTH_DATE,
            dim: 0.5,
        }
    }
}

impl EarthConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.dim.is_finite() || self.dim <= 0.0 {
            return Err(ValidationError::InvalidDim(self.dim));
        }
        Ok(())
    }
}

/// Parameters of the natural events lookup and its proximity filter
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Number of most recent events requested from the feed
    pub limit: u32,
    /// How far back the feed looks, in days
    pub days: u32,
    /// Half-width of the bounding box around the requested coordinate, per axis
    pub radius_degrees: f64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        EventsConfig {
            limit: MAX_EVENT_LIMIT,
            days: 30,
            radius_degrees: 5.0,
        }
    }
}

impl EventsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 || self.limit > MAX_EVENT_LIMIT {
            return Err(ValidationError::InvalidEventLimit(self.limit));
        }
        if self.days == 0 {
            return Err(ValidationError::InvalidEventDays);
        }
        if !self.radius_degrees.is_finite() || self.radius_degrees <= 0.0 {
            return Err(ValidationError::InvalidRadius(self.radius_degrees));
        }
        Ok(())
    }
}
