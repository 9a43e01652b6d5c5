use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use log::{info, warn};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use uuid::Uuid;

use crate::enricher::RouteTrafficEnricher;
use crate::error::PipelineError;
use crate::geocode::AddressResolver;
use crate::model::{Coordinate, EnrichedRoute, RoutePreference, TravelMode, WeatherFacts};
use crate::route_provider::RouteProvider;
use crate::weather::{FactSource, fetch_weather_facts};

/// Where a trip starts
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Coordinates(Coordinate),
    Address(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    /// Prefixes every log line written for this request
    pub request_id: Uuid,
    pub origin: Origin,
    pub destination: String,
    pub mode: TravelMode,
}

/// Everything the page needs to draw a successful answer
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// One `"<name>: <H>h <M>m <S>s"` line per route
    pub durations: Vec<String>,
    pub routes: Vec<EnrichedRoute>,
    pub weather: WeatherFacts,
}

/// `H`h `M`m `S`s, fractional seconds truncated.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    let (hours, remainder) = (total / 3600, total % 3600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);
    format!("{}h {}m {}s", hours, minutes, seconds)
}

fn is_valid_coordinate(c: Coordinate) -> bool {
    c.lat.is_finite() && c.lng.is_finite() && c.lat.abs() <= 90.0 && c.lng.abs() <= 180.0
}

/// Runs one request from addresses to an enriched, renderable plan.
pub struct RequestPipeline {
    resolver: Arc<dyn AddressResolver>,
    routes: Arc<dyn RouteProvider>,
    facts: Arc<dyn FactSource>,
    enricher: RouteTrafficEnricher,
}

impl RequestPipeline {
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        routes: Arc<dyn RouteProvider>,
        facts: Arc<dyn FactSource>,
        enricher: RouteTrafficEnricher,
    ) -> Self {
        Self {
            resolver,
            routes,
            facts,
            enricher,
        }
    }

    /// Run with request-local randomness.
    pub async fn plan(&self, query: &RouteQuery) -> Result<RoutePlan, PipelineError> {
        let mut rng = StdRng::from_os_rng();
        self.run(query, &mut rng).await
    }

    pub async fn run<R: Rng + Send>(
        &self,
        query: &RouteQuery,
        rng: &mut R,
    ) -> Result<RoutePlan, PipelineError> {
        let started = Instant::now();
        let request_id = query.request_id;

        let origin = match &query.origin {
            Origin::Coordinates(c) => Some(*c).filter(|c| is_valid_coordinate(*c)),
            Origin::Address(address) => self.resolver.resolve(address).await,
        }
        .ok_or(PipelineError::InvalidStart)?;

        let geocode_started = Instant::now();
        let destination = self
            .resolver
            .resolve(&query.destination)
            .await
            .ok_or(PipelineError::InvalidDestination)?;
        info!(
            "[{}] Geocoding took {:.2}s",
            request_id,
            geocode_started.elapsed().as_secs_f64()
        );

        let weather = fetch_weather_facts(self.facts.as_ref(), origin).await;

        let candidates: Vec<_> = join_all(RoutePreference::ALL.iter().map(|&preference| {
            self.routes
                .get_route(origin, destination, query.mode, preference)
        }))
        .await
        .into_iter()
        .zip(RoutePreference::ALL)
        .filter_map(|(candidate, preference)| {
            if candidate.is_none() {
                warn!("[{}] No {} route available", request_id, preference.as_query());
            }
            candidate
        })
        .collect();

        if candidates.is_empty() {
            return Err(PipelineError::NoValidRoutes);
        }

        let durations = candidates
            .iter()
            .map(|c| format!("{}: {}", c.display_name, format_duration(c.duration_seconds)))
            .collect();

        let mut routes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            routes.push(self.enricher.enrich(candidate, request_id, rng).await);
        }

        info!(
            "[{}] Total processing time: {:.2}s",
            request_id,
            started.elapsed().as_secs_f64()
        );

        Ok(RoutePlan {
            origin,
            destination,
            durations,
            routes,
            weather,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::RouteCandidate;
    use crate::traffic::TrafficProbe;
    use crate::traffic::tests::{ScriptedProbe, source_with};
    use async_trait::async_trait;
    use std::collections::HashMap;

    pub(crate) struct MapResolver(pub HashMap<String, Coordinate>);

    #[async_trait]
    impl AddressResolver for MapResolver {
        async fn resolve(&self, address: &str) -> Option<Coordinate> {
            self.0.get(address).copied()
        }
    }

    /// Straight line routes with fixed durations, absent where `None`
    pub(crate) struct FixedRoutes {
        pub fastest: Option<f64>,
        pub shortest: Option<f64>,
    }

    #[async_trait]
    impl RouteProvider for FixedRoutes {
        async fn get_route(
            &self,
            origin: Coordinate,
            destination: Coordinate,
            _mode: TravelMode,
            preference: RoutePreference,
        ) -> Option<RouteCandidate> {
            let duration = match preference {
                RoutePreference::Fastest => self.fastest,
                RoutePreference::Shortest => self.shortest,
            }?;
            let geometry = (0..=30)
                .map(|i| {
                    let t = i as f64 / 30.0;
                    Coordinate::new(
                        origin.lat + (destination.lat - origin.lat) * t,
                        origin.lng + (destination.lng - origin.lng) * t,
                    )
                })
                .collect();
            Some(RouteCandidate::new(preference, geometry, duration))
        }
    }

    pub(crate) struct CalmFacts;

    #[async_trait]
    impl FactSource for CalmFacts {
        async fn temperature(&self, _at: Coordinate) -> Option<f64> {
            Some(18.0)
        }
        async fn humidity(&self, _at: Coordinate) -> Option<i64> {
            Some(55)
        }
        async fn wind_direction(&self, _at: Coordinate) -> String {
            "SW".to_string()
        }
        async fn air_quality_description(&self, _at: Coordinate) -> String {
            "The air quality index is 8 µg/m³".to_string()
        }
    }

    pub(crate) fn pipeline_with(fastest: Option<f64>, shortest: Option<f64>) -> RequestPipeline {
        pipeline_with_probe(Arc::new(ScriptedProbe::new(0)), fastest, shortest)
    }

    pub(crate) fn pipeline_with_probe(
        probe: Arc<dyn TrafficProbe>,
        fastest: Option<f64>,
        shortest: Option<f64>,
    ) -> RequestPipeline {
        let mut known = HashMap::new();
        known.insert("Alexanderplatz, Berlin".to_string(), Coordinate::new(52.5219, 13.4132));
        known.insert("Tempelhof, Berlin".to_string(), Coordinate::new(52.4731, 13.4039));

        let traffic = Arc::new(source_with(probe, 1));
        RequestPipeline::new(
            Arc::new(MapResolver(known)),
            Arc::new(FixedRoutes { fastest, shortest }),
            Arc::new(CalmFacts),
            RouteTrafficEnricher::new(traffic, 20),
        )
    }

    fn query(origin: Origin, destination: &str) -> RouteQuery {
        RouteQuery {
            request_id: Uuid::new_v4(),
            origin,
            destination: destination.to_string(),
            mode: TravelMode::Driving,
        }
    }

    async fn run(pipeline: &RequestPipeline, query: &RouteQuery) -> Result<RoutePlan, PipelineError> {
        let mut rng = StdRng::seed_from_u64(17);
        pipeline.run(query, &mut rng).await
    }

    #[test]
    fn durations_are_truncated() {
        assert_eq!(format_duration(1800.0), "0h 30m 0s");
        assert_eq!(format_duration(2100.0), "0h 35m 0s");
        assert_eq!(format_duration(3661.9), "1h 1m 1s");
        assert_eq!(format_duration(59.999), "0h 0m 59s");
        assert_eq!(format_duration(90061.0), "25h 1m 1s");
        assert_eq!(format_duration(f64::NAN), "0h 0m 0s");
    }

    #[tokio::test]
    async fn two_routes_produce_two_durations() {
        let pipeline = pipeline_with(Some(1800.0), Some(2100.0));
        let plan = run(
            &pipeline,
            &query(Origin::Address("Alexanderplatz, Berlin".into()), "Tempelhof, Berlin"),
        )
        .await
        .unwrap();

        assert_eq!(plan.durations, vec!["Fastest: 0h 30m 0s", "Shortest: 0h 35m 0s"]);
        assert_eq!(plan.routes.len(), 2);
        assert_eq!(plan.routes[0].route.preference, RoutePreference::Fastest);
        assert_eq!(plan.routes[1].route.preference, RoutePreference::Shortest);
        for route in &plan.routes {
            assert_eq!(route.segments.len(), 19);
        }
        assert_eq!(plan.weather.wind_direction, "SW");
    }

    #[tokio::test]
    async fn one_missing_alternative_is_tolerated() {
        let pipeline = pipeline_with(None, Some(2100.0));
        let plan = run(
            &pipeline,
            &query(Origin::Coordinates(Coordinate::new(52.52, 13.40)), "Tempelhof, Berlin"),
        )
        .await
        .unwrap();

        assert_eq!(plan.durations, vec!["Shortest: 0h 35m 0s"]);
        assert_eq!(plan.origin, Coordinate::new(52.52, 13.40));
    }

    #[tokio::test]
    async fn no_alternatives_is_terminal() {
        let pipeline = pipeline_with(None, None);
        let err = run(
            &pipeline,
            &query(Origin::Address("Alexanderplatz, Berlin".into()), "Tempelhof, Berlin"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.user_message(), "No valid routes found");
    }

    #[tokio::test]
    async fn unresolved_destination_is_terminal() {
        let pipeline = pipeline_with(Some(1800.0), Some(2100.0));
        let err = run(
            &pipeline,
            &query(Origin::Address("Alexanderplatz, Berlin".into()), "Atlantis"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.user_message(), "Invalid destination");
    }

    #[tokio::test]
    async fn unresolved_or_invalid_origin_is_terminal() {
        let pipeline = pipeline_with(Some(1800.0), Some(2100.0));

        let err = run(&pipeline, &query(Origin::Address("Nowhere".into()), "Tempelhof, Berlin"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid starting point");

        let err = run(
            &pipeline,
            &query(Origin::Coordinates(Coordinate::new(f64::NAN, 13.0)), "Tempelhof, Berlin"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.user_message(), "Invalid starting point");
    }
}
