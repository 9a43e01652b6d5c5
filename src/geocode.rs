use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::model::Coordinate;

/// Turns a free-form address into a coordinate.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<Coordinate>;
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: [f64; 2],
}

pub(crate) fn parse_geocode(body: &str) -> Result<Coordinate, FetchError> {
    let geo: GeoResponse = serde_json::from_str(body)?;
    geo.features
        .first()
        .map(|f| Coordinate::from_lng_lat(f.geometry.coordinates))
        .ok_or_else(|| FetchError::MissingData("geocode features".to_string()))
}

/// openrouteservice (Pelias) search endpoint
pub struct OrsGeocoder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OrsGeocoder {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(config.geocode_timeout).build()?,
            api_key: config.ors_api_key.clone(),
            base_url: config.ors_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, address: &str) -> Result<Coordinate, FetchError> {
        let url = format!("{}/geocode/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("text", address),
                ("size", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        parse_geocode(&response.text().await?)
    }
}

#[async_trait]
impl AddressResolver for OrsGeocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinate> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        match self.search(address).await {
            Ok(coordinate) => {
                debug!("Geocoded {:?} to {:?}", address, coordinate);
                Some(coordinate)
            }
            Err(e) => {
                error!("Geocoding failed for {:?}: {}", address, e);
                None
            }
        }
    }
}
