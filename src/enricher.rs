use std::sync::Arc;
use std::time::Instant;

use log::info;
use rand::Rng;
use uuid::Uuid;

use crate::model::{EnrichedRoute, RouteCandidate, TrafficSample, TrafficSegment};
use crate::sampler::sample;
use crate::traffic::TrafficDataSource;
use crate::traffic_color::color_for;

/// Adds a colored traffic overlay to a route alternative.
pub struct RouteTrafficEnricher {
    traffic: Arc<TrafficDataSource>,
    max_points: usize,
}

impl RouteTrafficEnricher {
    pub fn new(traffic: Arc<TrafficDataSource>, max_points: usize) -> Self {
        Self {
            traffic,
            max_points,
        }
    }

    pub async fn enrich<R: Rng + Send>(
        &self,
        route: RouteCandidate,
        request_id: Uuid,
        rng: &mut R,
    ) -> EnrichedRoute {
        let started = Instant::now();
        let points = sample(&route.geometry, self.max_points);
        let report = self.traffic.fetch(&points, request_id, rng).await;

        info!(
            "[{}] Traffic data for {} took {:.2}s ({} samples, simulated: {})",
            request_id,
            route.display_name,
            started.elapsed().as_secs_f64(),
            report.samples.len(),
            report.simulated
        );

        EnrichedRoute {
            segments: build_segments(&report.samples),
            simulated_traffic: report.simulated,
            route,
        }
    }
}

/// One segment per adjacent pair, colored by the pair's mean ratio.
pub fn build_segments(samples: &[TrafficSample]) -> Vec<TrafficSegment> {
    samples
        .windows(2)
        .map(|pair| TrafficSegment {
            from: pair[0].coordinate,
            to: pair[1].coordinate,
            color: color_for((pair[0].speed_ratio + pair[1].speed_ratio) / 2.0),
        })
        .collect()
}
