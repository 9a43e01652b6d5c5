use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::model::{Coordinate, WeatherFacts};

const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Scalar ambient facts about a location. Each lookup degrades on its own.
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn temperature(&self, at: Coordinate) -> Option<f64>;
    async fn humidity(&self, at: Coordinate) -> Option<i64>;
    /// Compass label, or "Unknown"
    async fn wind_direction(&self, at: Coordinate) -> String;
    async fn air_quality_description(&self, at: Coordinate) -> String;

    /// All four facts, gathered concurrently. Sources backed by one upstream
    /// reading override this to fetch it once.
    async fn facts(&self, at: Coordinate) -> WeatherFacts {
        let (temperature, humidity, wind_direction, air_quality) = tokio::join!(
            self.temperature(at),
            self.humidity(at),
            self.wind_direction(at),
            self.air_quality_description(at),
        );
        WeatherFacts {
            temperature,
            humidity,
            wind_direction,
            air_quality,
        }
    }
}

/// Never fails; missing facts carry their placeholders.
pub async fn fetch_weather_facts(source: &dyn FactSource, at: Coordinate) -> WeatherFacts {
    source.facts(at).await
}

/// Eight-point compass label for a bearing in degrees
pub fn compass_label(degrees: f64) -> &'static str {
    let sector = (degrees / (360.0 / COMPASS.len() as f64)).round() as i64;
    COMPASS[sector.rem_euclid(COMPASS.len() as i64) as usize]
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: Option<MainReadings>,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    deg: Option<f64>,
}

impl CurrentWeather {
    fn temperature(&self) -> Option<f64> {
        self.main.as_ref().and_then(|m| m.temp)
    }

    fn humidity(&self) -> Option<i64> {
        self.main
            .as_ref()
            .and_then(|m| m.humidity)
            .map(|h| h.round() as i64)
    }

    fn wind_label(&self) -> String {
        match self.wind.as_ref().and_then(|wind| wind.deg) {
            Some(deg) => compass_label(deg).to_string(),
            None => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    #[serde(default)]
    results: Vec<AirQualityResult>,
}

#[derive(Debug, Deserialize)]
struct AirQualityResult {
    #[serde(default)]
    measurements: Vec<Measurement>,
}

#[derive(Debug, Deserialize)]
struct Measurement {
    value: f64,
    unit: String,
}

pub(crate) fn parse_air_quality(body: &str) -> Result<String, FetchError> {
    let response: AirQualityResponse = serde_json::from_str(body)?;
    let measurement = response
        .results
        .first()
        .and_then(|r| r.measurements.first())
        .ok_or_else(|| FetchError::MissingData("pm25 measurement".to_string()))?;
    Ok(format!(
        "The air quality index is {} {}",
        measurement.value, measurement.unit
    ))
}

/// OpenWeatherMap current conditions plus OpenAQ PM2.5 readings
pub struct OpenWeatherFactSource {
    client: Client,
    api_key: String,
    weather_base_url: String,
    air_quality_base_url: String,
}

impl OpenWeatherFactSource {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(config.weather_timeout).build()?,
            api_key: config.openweather_api_key.clone(),
            weather_base_url: config.openweather_base_url.trim_end_matches('/').to_string(),
            air_quality_base_url: config.openaq_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn current_weather(&self, at: Coordinate) -> Result<CurrentWeather, FetchError> {
        let url = format!("{}/data/2.5/weather", self.weather_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(serde_json::from_str(&response.text().await?)?)
    }

    async fn conditions(&self, at: Coordinate) -> Option<CurrentWeather> {
        match self.current_weather(at).await {
            Ok(weather) => Some(weather),
            Err(e) => {
                error!("Error fetching current weather: {}", e);
                None
            }
        }
    }

    async fn latest_air_quality(&self, at: Coordinate) -> Result<String, FetchError> {
        let url = format!("{}/v1/latest", self.air_quality_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("coordinates", format!("{},{}", at.lat, at.lng)),
                ("radius", "10000".to_string()),
                ("parameter", "pm25".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        parse_air_quality(&response.text().await?)
    }
}

#[async_trait]
impl FactSource for OpenWeatherFactSource {
    async fn temperature(&self, at: Coordinate) -> Option<f64> {
        self.conditions(at).await.and_then(|w| w.temperature())
    }

    async fn humidity(&self, at: Coordinate) -> Option<i64> {
        self.conditions(at).await.and_then(|w| w.humidity())
    }

    async fn wind_direction(&self, at: Coordinate) -> String {
        match self.conditions(at).await {
            Some(w) => w.wind_label(),
            None => "Unknown".to_string(),
        }
    }

    async fn air_quality_description(&self, at: Coordinate) -> String {
        match self.latest_air_quality(at).await {
            Ok(description) => description,
            Err(e) => {
                error!("Error fetching air quality: {}", e);
                "Air quality data unavailable".to_string()
            }
        }
    }

    async fn facts(&self, at: Coordinate) -> WeatherFacts {
        let (weather, air_quality) =
            tokio::join!(self.conditions(at), self.air_quality_description(at));
        let facts = WeatherFacts {
            temperature: weather.as_ref().and_then(CurrentWeather::temperature),
            humidity: weather.as_ref().and_then(CurrentWeather::humidity),
            wind_direction: weather
                .as_ref()
                .map(CurrentWeather::wind_label)
                .unwrap_or_else(|| "Unknown".to_string()),
            air_quality,
        };
        info!(
            "Weather: {}°C, {}% humidity, wind {}",
            facts.temperature_label(),
            facts.humidity_label(),
            facts.wind_direction
        );
        facts
    }
}
