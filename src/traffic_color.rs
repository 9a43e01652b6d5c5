use serde::Serialize;

/// Discrete traffic severity, ordered from slowest to fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TrafficColor {
    Red,
    Orange,
    Green,
    Blue,
}

/// Upper bounds checked in ascending order, first match wins.
const THRESHOLDS: [(f64, TrafficColor); 4] = [
    (0.0, TrafficColor::Red),
    (0.5, TrafficColor::Orange),
    (0.8, TrafficColor::Green),
    (1.0, TrafficColor::Blue),
];

impl TrafficColor {
    pub const ALL: [TrafficColor; 4] = [
        TrafficColor::Red,
        TrafficColor::Orange,
        TrafficColor::Green,
        TrafficColor::Blue,
    ];

    pub fn hex(self) -> &'static str {
        match self {
            TrafficColor::Red => "#FF0000",
            TrafficColor::Orange => "#FFA500",
            TrafficColor::Green => "#00FF00",
            TrafficColor::Blue => "#0000FF",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrafficColor::Red => "Heavy",
            TrafficColor::Orange => "Moderate",
            TrafficColor::Green => "Flowing",
            TrafficColor::Blue => "Fast",
        }
    }
}

/// Map a speed ratio onto a severity class. Total over all inputs, including
/// out-of-range and NaN values, which land on the top class.
pub fn color_for(speed_ratio: f64) -> TrafficColor {
    THRESHOLDS
        .iter()
        .find(|(threshold, _)| speed_ratio <= *threshold)
        .map(|(_, color)| *color)
        .unwrap_or(TrafficColor::Blue)
}
