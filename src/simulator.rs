use std::sync::Arc;

use chrono::Timelike;
use rand::Rng;

use crate::model::{Coordinate, TrafficSample};

pub const MIN_SPEED_RATIO: f64 = 0.1;
pub const MAX_SPEED_RATIO: f64 = 1.0;

/// Chance that a point is hit by a synthetic incident
const INCIDENT_PROBABILITY: f64 = 0.1;

/// Source of the local wall-clock hour
pub trait Clock: Send + Sync {
    fn local_hour(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// Clock pinned to one hour of the day
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn local_hour(&self) -> u32 {
        self.0
    }
}

pub fn is_rush_hour(hour: u32) -> bool {
    (7..=9).contains(&hour) || (17..=19).contains(&hour)
}

/// Clamp a ratio into the range the rest of the pipeline expects.
pub fn clamp_ratio(ratio: f64) -> f64 {
    ratio.clamp(MIN_SPEED_RATIO, MAX_SPEED_RATIO)
}

/// Synthesizes a plausible traffic profile from time-of-day heuristics.
#[derive(Clone)]
pub struct SimulatedTrafficGenerator {
    clock: Arc<dyn Clock>,
}

impl SimulatedTrafficGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn generate<R: Rng>(
        &self,
        points: &[Coordinate],
        rng: &mut R,
    ) -> Vec<TrafficSample> {
        let rush = is_rush_hour(self.clock.local_hour());

        points
            .iter()
            .map(|&coordinate| {
                let mut ratio = if rush {
                    rng.random_range(0.3..=0.7)
                } else {
                    rng.random_range(0.6..=1.0)
                };
                if rng.random_bool(INCIDENT_PROBABILITY) {
                    ratio *= rng.random_range(0.3..=0.6);
                }
                TrafficSample {
                    coordinate,
                    speed_ratio: clamp_ratio(ratio),
                }
            })
            .collect()
    }
}
