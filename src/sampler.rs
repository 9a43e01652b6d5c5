use crate::model::Coordinate;

/// Pick evenly spaced points from a route to query for traffic.
///
/// The first point is always kept, order is preserved and the result never
/// exceeds `max_points`. Geometry that already fits is returned unchanged.
/// Picks sit at `i * len / max_points`: the plain floor stride when it divides
/// the route exactly, otherwise still reaching the final stride window.
pub fn sample(route_geometry: &[Coordinate], max_points: usize) -> Vec<Coordinate> {
    let len = route_geometry.len();
    if max_points == 0 {
        return Vec::new();
    }
    if len <= max_points {
        return route_geometry.to_vec();
    }

    (0..max_points)
        .map(|i| route_geometry[i * len / max_points])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(52.0 + i as f64 * 0.001, 13.0))
            .collect()
    }

    #[test]
    fn short_geometry_is_returned_unchanged() {
        let geometry = line(7);
        assert_eq!(sample(&geometry, 20), geometry);
        assert_eq!(sample(&geometry, 7), geometry);
    }

    #[test]
    fn strides_through_long_geometry() {
        let geometry = line(100);
        let sampled = sample(&geometry, 20);
        assert_eq!(sampled.len(), 20);
        assert_eq!(sampled[0], geometry[0]);
        assert_eq!(sampled[1], geometry[5]);
        assert_eq!(sampled[19], geometry[95]);
    }

    #[test]
    fn never_exceeds_max_points() {
        for len in 0..200 {
            let geometry = line(len);
            for max_points in 1..30 {
                let sampled = sample(&geometry, max_points);
                assert!(sampled.len() <= max_points, "len {} max {}", len, max_points);
                if len > 0 {
                    assert_eq!(sampled[0], geometry[0]);
                }
            }
        }
    }

    #[test]
    fn uneven_lengths_reach_the_end_of_the_route() {
        let geometry = line(39);
        let sampled = sample(&geometry, 20);
        assert_eq!(sampled.len(), 20);
        assert_eq!(sampled[0], geometry[0]);
        assert_eq!(sampled[19], geometry[37]);

        for len in 21..200 {
            let geometry = line(len);
            let sampled = sample(&geometry, 20);
            let indices: Vec<usize> = sampled
                .iter()
                .map(|c| geometry.iter().position(|g| g == c).unwrap())
                .collect();
            assert_eq!(indices.len(), 20);
            assert!(indices.windows(2).all(|w| w[0] < w[1]), "len {}", len);
            let window = len.div_ceil(20);
            assert!(indices[19] >= len - window, "len {} last {}", len, indices[19]);
        }
    }

    #[test]
    fn degenerate_inputs() {
        assert!(sample(&[], 20).is_empty());
        assert!(sample(&line(5), 0).is_empty());
    }
}
