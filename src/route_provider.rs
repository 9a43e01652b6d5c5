use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::model::{Coordinate, RouteCandidate, RoutePreference, TravelMode};

/// Directions between two points for one optimization preference.
///
/// Implementations never fail outward: any transport error, non-success
/// status or unusable payload is reported as `None`.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
        preference: RoutePreference,
    ) -> Option<RouteCandidate>;
}

// --- openrouteservice GeoJSON directions payload ---

#[derive(Debug, Deserialize)]
struct DirectionsGeoJson {
    #[serde(default)]
    features: Vec<RouteFeature>,
}

#[derive(Debug, Deserialize)]
struct RouteFeature {
    geometry: Option<LineGeometry>,
    properties: Option<RouteProperties>,
}

#[derive(Debug, Deserialize)]
struct LineGeometry {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct RouteProperties {
    #[serde(default)]
    segments: Vec<RouteSegment>,
    summary: Option<RouteSummary>,
}

#[derive(Debug, Deserialize)]
struct RouteSegment {
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RouteSummary {
    duration: Option<f64>,
    distance: Option<f64>,
}

/// Extract the first route of a directions response.
pub(crate) fn parse_directions(
    body: &str,
    preference: RoutePreference,
) -> Result<RouteCandidate, FetchError> {
    let response: DirectionsGeoJson = serde_json::from_str(body)?;
    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::MissingData("features".to_string()))?;

    let properties = feature
        .properties
        .ok_or_else(|| FetchError::MissingData("properties".to_string()))?;

    let duration = properties
        .segments
        .first()
        .and_then(|s| s.duration)
        .or_else(|| properties.summary.as_ref().and_then(|s| s.duration))
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| FetchError::MissingData("duration".to_string()))?;

    let geometry: Vec<Coordinate> = feature
        .geometry
        .map(|g| g.coordinates)
        .unwrap_or_default()
        .into_iter()
        .map(Coordinate::from_lng_lat)
        .collect();
    if geometry.is_empty() {
        return Err(FetchError::MissingData("geometry".to_string()));
    }

    let mut candidate = RouteCandidate::new(preference, geometry, duration);
    candidate.distance_meters = properties.summary.and_then(|s| s.distance);
    Ok(candidate)
}

pub struct OrsRouteProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OrsRouteProvider {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(config.route_timeout).build()?,
            api_key: config.ors_api_key.clone(),
            base_url: config.ors_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
        preference: RoutePreference,
    ) -> Result<RouteCandidate, FetchError> {
        let url = format!("{}/v2/directions/{}/geojson", self.base_url, mode.profile());
        let body = json!({
            "coordinates": [origin.to_lng_lat(), destination.to_lng_lat()],
            "preference": preference.as_query(),
        });
        debug!(
            "Requesting {} route {:?} -> {:?} ({})",
            preference.as_query(),
            origin,
            destination,
            mode.profile()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!("Directions API returned {}. Body: {}", status, text);
            return Err(FetchError::Status(status.as_u16()));
        }

        parse_directions(&text, preference)
    }
}

#[async_trait]
impl RouteProvider for OrsRouteProvider {
    async fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
        preference: RoutePreference,
    ) -> Option<RouteCandidate> {
        match self
            .fetch_directions(origin, destination, mode, preference)
            .await
        {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("Route API failed ({}): {}", preference.as_query(), e);
                None
            }
        }
    }
}
