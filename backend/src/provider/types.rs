use serde::{Deserialize, Serialize};

// --- OpenRouteService directions payloads ---

#[derive(Serialize, Debug, PartialEq)]
pub struct DirectionsRequest {
    /// `[lon, lat]` pairs.
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize, Debug)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Deserialize, Debug)]
pub struct Route {
    /// Encoded polyline, precision 5.
    pub geometry: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Deserialize, Debug)]
pub struct Segment {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Deserialize, Debug)]
pub struct Step {
    #[serde(default)]
    pub instruction: Option<String>,
}

// Helper structs to parse the JSON error response from ORS
#[derive(Deserialize, Debug)]
pub struct OrsErrorDetail {
    pub code: u32,
    pub message: String,
}

#[derive(Deserialize, Debug)]
pub struct OrsErrorPayload {
    pub error: OrsErrorDetail,
}
