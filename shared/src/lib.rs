use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        let coord = Self { lat, lon };
        coord.validate()?;
        Ok(coord)
    }

    /// NaN and infinities fail both range checks.
    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::Latitude(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(CoordinateError::Longitude(self.lon));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Shifts by degrees, staying on the globe: latitude is clamped at the
    /// poles and longitude wraps across the antimeridian.
    pub fn offset(self, d_lat: f64, d_lon: f64) -> Self {
        let lon = self.lon + d_lon;
        Self {
            lat: (self.lat + d_lat).clamp(-90.0, 90.0),
            lon: if (-180.0..=180.0).contains(&lon) {
                lon
            } else {
                (lon + 180.0).rem_euclid(360.0) - 180.0
            },
        }
    }

    /// Routing providers speak GeoJSON order: longitude first.
    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Where the selected route came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RouteSource {
    Detour { from: String, to: String },
    Jitter,
}

/// The route currently exposed to the map for one destination choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub points: Vec<Coordinate>,
    pub instructions: Vec<String>,
    pub length_proxy: u64,
    pub source: RouteSource,
}

impl SelectionResult {
    pub fn is_fallback(&self) -> bool {
        self.source == RouteSource::Jitter
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub end: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub route: SelectionResult,
    pub distance_km: f64,
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationRequest {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub start: Option<Coordinate>,
    pub start_name: String,
    pub end: Option<Coordinate>,
    pub end_name: String,
    pub target: Option<Coordinate>,
    pub generation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<SelectionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub coords: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
