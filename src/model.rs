use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::traffic_color::TrafficColor;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a GeoJSON style `[lng, lat]` pair
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lng, c.lat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutePreference {
    Fastest,
    Shortest,
}

impl RoutePreference {
    pub const ALL: [RoutePreference; 2] = [RoutePreference::Fastest, RoutePreference::Shortest];

    /// Value sent to the directions provider
    pub fn as_query(self) -> &'static str {
        match self {
            RoutePreference::Fastest => "fastest",
            RoutePreference::Shortest => "shortest",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RoutePreference::Fastest => "Fastest",
            RoutePreference::Shortest => "Shortest",
        }
    }

    pub fn display_color(self) -> &'static str {
        match self {
            RoutePreference::Fastest => "#0000FF",
            RoutePreference::Shortest => "#FF00FF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelMode {
    Driving,
    Walking,
}

impl TravelMode {
    /// Anything other than `car` is treated as walking.
    pub fn from_vehicle_type(vehicle_type: &str) -> Self {
        if vehicle_type.trim().eq_ignore_ascii_case("car") {
            TravelMode::Driving
        } else {
            TravelMode::Walking
        }
    }

    pub fn profile(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving-car",
            TravelMode::Walking => "foot-walking",
        }
    }
}

/// One route alternative returned by the directions provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCandidate {
    pub preference: RoutePreference,
    pub display_name: String,
    pub display_color: String,
    pub geometry: Vec<Coordinate>,
    pub duration_seconds: f64,
    pub distance_meters: Option<f64>,
}

impl RouteCandidate {
    pub fn new(preference: RoutePreference, geometry: Vec<Coordinate>, duration_seconds: f64) -> Self {
        Self {
            preference,
            display_name: preference.display_name().to_string(),
            display_color: preference.display_color().to_string(),
            geometry,
            duration_seconds,
            distance_meters: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrafficSample {
    pub coordinate: Coordinate,
    /// Always finite and within `[0.1, 1.0]`
    pub speed_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrafficSegment {
    pub from: Coordinate,
    pub to: Coordinate,
    pub color: TrafficColor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRoute {
    pub route: RouteCandidate,
    pub segments: Vec<TrafficSegment>,
    /// True when the whole traffic profile was synthesized
    pub simulated_traffic: bool,
}

/// Ambient conditions at the origin. Every field degrades independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherFacts {
    pub temperature: Option<f64>,
    pub humidity: Option<i64>,
    pub wind_direction: String,
    pub air_quality: String,
}

impl Default for WeatherFacts {
    fn default() -> Self {
        Self {
            temperature: None,
            humidity: None,
            wind_direction: "Unknown".to_string(),
            air_quality: "Air quality data unavailable".to_string(),
        }
    }
}

impl WeatherFacts {
    pub fn temperature_label(&self) -> String {
        match self.temperature {
            Some(t) => format!("{}", t),
            None => "N/A".to_string(),
        }
    }

    pub fn humidity_label(&self) -> String {
        match self.humidity {
            Some(h) => h.to_string(),
            None => "N/A".to_string(),
        }
    }
}
