use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::{StreamExt, stream};
use log::{debug, info, warn};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::model::{Coordinate, TrafficSample};
use crate::simulator::{SimulatedTrafficGenerator, clamp_ratio};

/// Used when a payload reports a non-positive free-flow speed
const UNKNOWN_FLOW_RATIO: f64 = 0.8;
const DEFAULT_CURRENT_SPEED: f64 = 50.0;
const DEFAULT_FREE_FLOW_SPEED: f64 = 60.0;

/// Live speed-ratio lookup for a single point.
#[async_trait]
pub trait TrafficProbe: Send + Sync {
    /// Ok only for a structurally valid payload
    async fn lookup(&self, point: Coordinate) -> Result<f64, FetchError>;
}

#[derive(Debug, Deserialize)]
struct FlowResponse {
    #[serde(rename = "flowSegmentData")]
    flow_segment_data: Option<FlowSegmentData>,
}

#[derive(Debug, Deserialize)]
struct FlowSegmentData {
    #[serde(rename = "currentSpeed")]
    current_speed: Option<f64>,
    #[serde(rename = "freeFlowSpeed")]
    free_flow_speed: Option<f64>,
}

pub(crate) fn live_ratio(current_speed: f64, free_flow_speed: f64) -> f64 {
    let ratio = if free_flow_speed > 0.0 {
        current_speed / free_flow_speed
    } else {
        UNKNOWN_FLOW_RATIO
    };
    if ratio.is_finite() {
        clamp_ratio(ratio)
    } else {
        UNKNOWN_FLOW_RATIO
    }
}

pub(crate) fn parse_flow_ratio(body: &str) -> Result<f64, FetchError> {
    let response: FlowResponse = serde_json::from_str(body)?;
    let data = response
        .flow_segment_data
        .ok_or_else(|| FetchError::MissingData("flowSegmentData".to_string()))?;

    Ok(live_ratio(
        data.current_speed.unwrap_or(DEFAULT_CURRENT_SPEED),
        data.free_flow_speed.unwrap_or(DEFAULT_FREE_FLOW_SPEED),
    ))
}

/// TomTom flow segment API
pub struct TomTomTrafficProbe {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TomTomTrafficProbe {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(config.traffic_timeout).build()?,
            api_key: config.tomtom_api_key.clone(),
            base_url: config.tomtom_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TrafficProbe for TomTomTrafficProbe {
    async fn lookup(&self, point: Coordinate) -> Result<f64, FetchError> {
        if self.api_key.is_empty() {
            return Err(FetchError::Unavailable("no TomTom API key configured".to_string()));
        }

        let url = format!(
            "{}/traffic/services/4/flowSegmentData/absolute/10/json",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .query(&[
                ("point", format!("{},{}", point.lat, point.lng)),
                ("unit", "KMPH".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_flow_ratio(&body)
    }
}

/// Traffic for one sampled route, along with how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficReport {
    pub samples: Vec<TrafficSample>,
    /// Points that returned a structurally valid live payload
    pub valid_points: usize,
    /// True when the live result was discarded for a synthetic profile
    pub simulated: bool,
}

/// Live traffic lookups with point-level and full-route fallbacks.
pub struct TrafficDataSource {
    probe: Arc<dyn TrafficProbe>,
    simulator: SimulatedTrafficGenerator,
    request_delay: Duration,
    concurrency: usize,
}

impl TrafficDataSource {
    pub fn new(
        probe: Arc<dyn TrafficProbe>,
        simulator: SimulatedTrafficGenerator,
        config: &AppConfig,
    ) -> Self {
        Self {
            probe,
            simulator,
            request_delay: config.traffic_request_delay,
            concurrency: config.traffic_concurrency.max(1),
        }
    }

    /// Always yields one sample per input point, in input order.
    ///
    /// Failed points get a random ratio in `[0.5, 0.9]`. Only when no point
    /// at all came back valid is the whole result replaced by simulation.
    pub async fn fetch<R: Rng + Send>(
        &self,
        points: &[Coordinate],
        request_id: Uuid,
        rng: &mut R,
    ) -> TrafficReport {
        let mut lookups = stream::iter(points.iter().copied())
            .map(|point| async move {
                let result = self.probe.lookup(point).await;
                if !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }
                result
            })
            .buffered(self.concurrency);

        let mut results = Vec::with_capacity(points.len());
        while let Some(result) = lookups.next().await {
            if let Err(e) = &result {
                if e.is_unavailable() {
                    warn!("[{}] Traffic API failed: {}", request_id, e);
                    return self.simulate(points, rng);
                }
            }
            results.push(result);
        }

        let mut valid_points = 0;
        let samples: Vec<TrafficSample> = points
            .iter()
            .zip(results)
            .map(|(&coordinate, result)| {
                let speed_ratio = match result {
                    Ok(ratio) => {
                        valid_points += 1;
                        ratio
                    }
                    Err(e) => {
                        debug!("[{}] Traffic lookup at {:?} failed: {}", request_id, coordinate, e);
                        rng.random_range(0.5..=0.9)
                    }
                };
                TrafficSample {
                    coordinate,
                    speed_ratio: clamp_ratio(speed_ratio),
                }
            })
            .collect();

        info!(
            "[{}] Valid traffic points: {}/{}",
            request_id,
            valid_points,
            samples.len()
        );

        if valid_points == 0 {
            return self.simulate(points, rng);
        }

        TrafficReport {
            samples,
            valid_points,
            simulated: false,
        }
    }

    fn simulate<R: Rng>(&self, points: &[Coordinate], rng: &mut R) -> TrafficReport {
        TrafficReport {
            samples: self.simulator.generate(points, rng),
            valid_points: 0,
            simulated: true,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::simulator::FixedClock;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Point `i` (encoded as its longitude) is valid iff `i < valid_count`.
    pub(crate) struct ScriptedProbe {
        pub valid_count: usize,
        pub ratio: f64,
        pub calls: AtomicUsize,
        pub unavailable_at: Option<usize>,
    }

    impl ScriptedProbe {
        pub fn new(valid_count: usize) -> Self {
            Self {
                valid_count,
                ratio: 0.42,
                calls: AtomicUsize::new(0),
                unavailable_at: None,
            }
        }
    }

    #[async_trait]
    impl TrafficProbe for ScriptedProbe {
        async fn lookup(&self, point: Coordinate) -> Result<f64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let index = point.lng as usize;
            if self.unavailable_at == Some(index) {
                return Err(FetchError::Unavailable("network down".to_string()));
            }
            if index < self.valid_count {
                Ok(self.ratio)
            } else {
                Err(FetchError::Status(503))
            }
        }
    }

    pub(crate) fn source_with(probe: Arc<dyn TrafficProbe>, concurrency: usize) -> TrafficDataSource {
        let config = AppConfig {
            traffic_request_delay: Duration::ZERO,
            traffic_concurrency: concurrency,
            ..AppConfig::default()
        };
        TrafficDataSource::new(
            probe,
            SimulatedTrafficGenerator::new(Arc::new(FixedClock(14))),
            &config,
        )
    }

    fn indexed_points(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| Coordinate::new(40.0, i as f64)).collect()
    }

    #[tokio::test]
    async fn falls_back_only_when_no_point_is_valid() {
        for (valid, expect_simulated) in [(0, true), (1, false), (5, false)] {
            let source = source_with(Arc::new(ScriptedProbe::new(valid)), 1);
            let mut rng = StdRng::seed_from_u64(5);
            let points = indexed_points(5);

            let report = source.fetch(&points, Uuid::nil(), &mut rng).await;

            assert_eq!(report.simulated, expect_simulated, "{} valid", valid);
            assert_eq!(report.valid_points, if expect_simulated { 0 } else { valid });
            assert_eq!(report.samples.len(), points.len());
        }
    }

    #[tokio::test]
    async fn partial_results_mix_live_and_point_fallback() {
        let source = source_with(Arc::new(ScriptedProbe::new(2)), 1);
        let mut rng = StdRng::seed_from_u64(9);
        let points = indexed_points(5);

        let report = source.fetch(&points, Uuid::nil(), &mut rng).await;

        assert_eq!(report.samples[0].speed_ratio, 0.42);
        assert_eq!(report.samples[1].speed_ratio, 0.42);
        for sample in &report.samples[2..] {
            assert!((0.5..=0.9).contains(&sample.speed_ratio));
        }
        for (sample, point) in report.samples.iter().zip(&points) {
            assert_eq!(sample.coordinate, *point);
        }
    }

    #[tokio::test]
    async fn concurrent_lookups_keep_order_and_count() {
        let source = source_with(Arc::new(ScriptedProbe::new(3)), 4);
        let mut rng = StdRng::seed_from_u64(1);
        let points = indexed_points(12);

        let report = source.fetch(&points, Uuid::nil(), &mut rng).await;

        assert!(!report.simulated);
        assert_eq!(report.valid_points, 3);
        assert_eq!(report.samples.len(), 12);
        for (sample, point) in report.samples.iter().zip(&points) {
            assert_eq!(sample.coordinate, *point);
        }
    }

    #[tokio::test]
    async fn unavailable_provider_aborts_into_simulation() {
        let probe = Arc::new(ScriptedProbe {
            unavailable_at: Some(1),
            ..ScriptedProbe::new(5)
        });
        let source = source_with(probe.clone(), 1);
        let mut rng = StdRng::seed_from_u64(3);
        let points = indexed_points(5);

        let report = source.fetch(&points, Uuid::nil(), &mut rng).await;

        assert!(report.simulated);
        assert_eq!(report.samples.len(), 5);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_report() {
        let source = source_with(Arc::new(ScriptedProbe::new(5)), 1);
        let mut rng = StdRng::seed_from_u64(3);
        let report = source.fetch(&[], Uuid::nil(), &mut rng).await;
        assert!(report.samples.is_empty());
    }

    #[test]
    fn flow_payload_is_parsed_and_clamped() {
        let body = r#"{"flowSegmentData":{"currentSpeed":30,"freeFlowSpeed":60}}"#;
        assert_eq!(parse_flow_ratio(body).unwrap(), 0.5);

        let faster = r#"{"flowSegmentData":{"currentSpeed":90,"freeFlowSpeed":60}}"#;
        assert_eq!(parse_flow_ratio(faster).unwrap(), 1.0);

        let stopped = r#"{"flowSegmentData":{"currentSpeed":0,"freeFlowSpeed":60}}"#;
        assert_eq!(parse_flow_ratio(stopped).unwrap(), 0.1);
    }

    #[test]
    fn flow_payload_defaults() {
        let no_speeds = r#"{"flowSegmentData":{}}"#;
        assert!((parse_flow_ratio(no_speeds).unwrap() - 50.0 / 60.0).abs() < 1e-12);

        let zero_free_flow = r#"{"flowSegmentData":{"currentSpeed":40,"freeFlowSpeed":0}}"#;
        assert_eq!(parse_flow_ratio(zero_free_flow).unwrap(), 0.8);
    }

    #[test]
    fn payload_without_flow_data_is_invalid() {
        assert!(matches!(
            parse_flow_ratio(r#"{"error":"quota"}"#),
            Err(FetchError::MissingData(_))
        ));
        assert!(matches!(parse_flow_ratio("<html>"), Err(FetchError::Parse(_))));
    }
}
