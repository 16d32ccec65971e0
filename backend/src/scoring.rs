use crate::{models::Coordinate, routing::approximate_distance_km};

/// Scores a stitched route; higher means messier. Each scorer carries the
/// admission bound calibrated for its own unit.
pub trait RouteScorer: Send + Sync {
    fn score(&self, points: &[Coordinate]) -> u64;

    /// Candidates scoring at or above this are never selected.
    fn admission_bound(&self) -> u64;

    fn admits(&self, score: u64) -> bool {
        score < self.admission_bound()
    }
}

/// Point count as a stand-in for route length.
#[derive(Debug, Clone, Copy)]
pub struct PointCount {
    pub bound: u64,
}

impl PointCount {
    /// Loose cap standing in for roughly 6000 route-km.
    pub const DEFAULT_BOUND: u64 = 10_000;
}

impl Default for PointCount {
    fn default() -> Self {
        Self {
            bound: Self::DEFAULT_BOUND,
        }
    }
}

impl RouteScorer for PointCount {
    fn score(&self, points: &[Coordinate]) -> u64 {
        points.len() as u64
    }

    fn admission_bound(&self) -> u64 {
        self.bound
    }
}

/// Great-circle length of the polyline in whole metres.
#[derive(Debug, Clone, Copy)]
pub struct HaversineMeters {
    pub bound_m: u64,
}

impl Default for HaversineMeters {
    fn default() -> Self {
        Self {
            bound_m: 6_000_000,
        }
    }
}

impl RouteScorer for HaversineMeters {
    fn score(&self, points: &[Coordinate]) -> u64 {
        (approximate_distance_km(points) * 1000.0).round() as u64
    }

    fn admission_bound(&self) -> u64 {
        self.bound_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_count_bound_is_exclusive() {
        let scorer = PointCount::default();
        assert!(scorer.admits(9_999));
        assert!(!scorer.admits(10_000));
        assert!(!scorer.admits(25_000));
    }

    #[test]
    fn point_count_counts_points() {
        let points = vec![Coordinate { lat: 0.0, lon: 0.0 }; 7];
        assert_eq!(PointCount::default().score(&points), 7);
    }

    #[test]
    fn haversine_scores_metres() {
        let points = vec![
            Coordinate { lat: 45.0, lon: 5.0 },
            Coordinate {
                lat: 45.009,
                lon: 5.0,
            },
        ];
        let score = HaversineMeters::default().score(&points);
        assert!((990..=1010).contains(&score), "got {score}");
    }
}
