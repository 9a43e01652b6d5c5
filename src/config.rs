use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::model::RoutePreference;

/// Headroom on top of the summed per-call timeouts
const REQUEST_SLACK: Duration = Duration::from_secs(15);

/// Process-wide settings, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    pub tomtom_api_key: String,
    pub ors_api_key: String,
    pub openweather_api_key: String,
    pub tomtom_base_url: String,
    pub ors_base_url: String,
    pub openweather_base_url: String,
    pub openaq_base_url: String,
    /// Timeout for one traffic point lookup
    pub traffic_timeout: Duration,
    /// Timeout for one directions call
    pub route_timeout: Duration,
    pub geocode_timeout: Duration,
    pub weather_timeout: Duration,
    /// Pause after each traffic lookup, keeps us under the provider rate limit
    pub traffic_request_delay: Duration,
    /// Maximum sampled points per route
    pub max_traffic_points: usize,
    /// Number of traffic lookups in flight at once
    pub traffic_concurrency: usize,
    /// Upper bound on a whole HTTP request. Defaults to [`AppConfig::request_budget`].
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut config = Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            tomtom_api_key: String::new(),
            ors_api_key: String::new(),
            openweather_api_key: String::new(),
            tomtom_base_url: "https://api.tomtom.com".to_string(),
            ors_base_url: "https://api.openrouteservice.org".to_string(),
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            openaq_base_url: "https://api.openaq.org".to_string(),
            traffic_timeout: Duration::from_secs(5),
            route_timeout: Duration::from_secs(10),
            geocode_timeout: Duration::from_secs(10),
            weather_timeout: Duration::from_secs(5),
            traffic_request_delay: Duration::from_millis(50),
            max_traffic_points: 20,
            traffic_concurrency: 1,
            request_timeout: Duration::ZERO,
        };
        config.request_timeout = config.request_budget();
        config
    }
}

impl AppConfig {
    /// Read settings from the environment, after loading an optional `.env`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let mut config = Self {
            bind_addr: string("BIND_ADDR", defaults.bind_addr),
            tomtom_api_key: string("TOMTOM_API_KEY", defaults.tomtom_api_key),
            ors_api_key: string("ORS_API_KEY", defaults.ors_api_key),
            openweather_api_key: string("OPENWEATHER_API_KEY", defaults.openweather_api_key),
            tomtom_base_url: string("TOMTOM_BASE_URL", defaults.tomtom_base_url),
            ors_base_url: string("ORS_BASE_URL", defaults.ors_base_url),
            openweather_base_url: string("OPENWEATHER_BASE_URL", defaults.openweather_base_url),
            openaq_base_url: string("OPENAQ_BASE_URL", defaults.openaq_base_url),
            traffic_timeout: secs(&lookup, "TRAFFIC_TIMEOUT_SECS", defaults.traffic_timeout)?,
            route_timeout: secs(&lookup, "ROUTE_TIMEOUT_SECS", defaults.route_timeout)?,
            geocode_timeout: secs(&lookup, "GEOCODE_TIMEOUT_SECS", defaults.geocode_timeout)?,
            weather_timeout: secs(&lookup, "WEATHER_TIMEOUT_SECS", defaults.weather_timeout)?,
            traffic_request_delay: Duration::from_millis(parsed(
                &lookup,
                "TRAFFIC_REQUEST_DELAY_MS",
                defaults.traffic_request_delay.as_millis() as u64,
            )?),
            max_traffic_points: parsed(&lookup, "MAX_TRAFFIC_POINTS", defaults.max_traffic_points)?,
            traffic_concurrency: parsed(
                &lookup,
                "TRAFFIC_CONCURRENCY",
                defaults.traffic_concurrency,
            )?
            .max(1),
            request_timeout: Duration::ZERO,
        };
        config.request_timeout = secs(&lookup, "REQUEST_TIMEOUT_SECS", config.request_budget())?;
        Ok(config)
    }

    /// Worst case for one request when every provider call runs into its
    /// timeout: both geocodes, the weather facts, the concurrent directions
    /// calls, then every traffic lookup of every route alternative.
    pub fn request_budget(&self) -> Duration {
        let rounds = self
            .max_traffic_points
            .div_ceil(self.traffic_concurrency.max(1)) as u32;
        let routes = RoutePreference::ALL.len() as u32;
        let traffic = (self.traffic_timeout + self.traffic_request_delay) * rounds * routes;

        self.geocode_timeout * 2 + self.weather_timeout + self.route_timeout + traffic + REQUEST_SLACK
    }
}

fn parsed<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parsed(lookup, key, default.as_secs()).map(Duration::from_secs)
}
