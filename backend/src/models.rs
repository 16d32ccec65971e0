use serde::{Deserialize, Serialize};

pub use shared::{
    ApiError, Coordinate, CoordinateError, DestinationRequest, Place, RouteRequest,
    RouteResponse, RouteSource, SelectionResult, SessionCreated, SessionSnapshot, StartRequest,
};

/// A named point used only as an intermediate stitching location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorNode {
    pub name: String,
    pub coords: Coordinate,
}

impl AnchorNode {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            coords: Coordinate { lat, lon },
        }
    }
}

/// Position of an unordered anchor pair in enumeration order, `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorPair {
    pub i: usize,
    pub j: usize,
}

/// Decoded output of one provider call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSegment {
    pub points: Vec<Coordinate>,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRoute {
    pub pair: AnchorPair,
    pub points: Vec<Coordinate>,
    pub instructions: Vec<String>,
    pub length_proxy: u64,
}

impl CandidateRoute {
    /// Start, at least one interior point, end.
    pub const MIN_POINTS: usize = 3;

    pub fn stitch(
        pair: AnchorPair,
        start: Coordinate,
        segment: RouteSegment,
        end: Coordinate,
    ) -> Self {
        let mut points = Vec::with_capacity(segment.points.len() + 2);
        points.push(start);
        points.extend(segment.points);
        points.push(end);
        Self {
            pair,
            points,
            instructions: segment.instructions,
            length_proxy: 0,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.points.len() >= Self::MIN_POINTS
    }
}
