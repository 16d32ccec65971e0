use std::{
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, header::AUTHORIZATION};

use super::types::{DirectionsRequest, DirectionsResponse, OrsErrorPayload};
use super::{ProviderError, SegmentFetcher};
use crate::models::{Coordinate, RouteSegment};

pub const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";
pub const DEFAULT_PROFILE: &str = "driving-car";
const POLYLINE_PRECISION: u32 = 5;

pub type Limiter = Arc<DefaultDirectRateLimiter>;

pub fn ors_limiter(per_minute: NonZeroU32) -> Limiter {
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

#[derive(Debug, Clone)]
pub struct OrsSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub profile: String,
    pub timeout: Duration,
    pub requests_per_minute: Option<NonZeroU32>,
}

impl Default for OrsSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            timeout: Duration::from_secs(15),
            requests_per_minute: NonZeroU32::new(40),
        }
    }
}

/// OpenRouteService directions client, one POST per segment.
pub struct OrsClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    profile: String,
    limiter: Option<Limiter>,
    missing_key_reported: AtomicBool,
}

impl OrsClient {
    pub fn new(settings: OrsSettings) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.filter(|key| !key.trim().is_empty()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            profile: settings.profile,
            limiter: settings.requests_per_minute.map(ors_limiter),
            missing_key_reported: AtomicBool::new(false),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn directions_url(&self) -> String {
        format!("{}/v2/directions/{}", self.base_url, self.profile)
    }

    fn missing_key(&self) -> ProviderError {
        if !self.missing_key_reported.swap(true, Ordering::Relaxed) {
            tracing::error!("ORS_API_KEY is not set; every segment fetch will fail until it is");
        }
        ProviderError::MissingApiKey
    }
}

#[async_trait]
impl SegmentFetcher for OrsClient {
    async fn fetch_segment(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteSegment, ProviderError> {
        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => return Err(self.missing_key()),
        };

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let url = self.directions_url();
        let body = directions_body(from, to);
        tracing::debug!("[PROVIDER] POST {} {:?}", url, body.coordinates);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), text));
        }

        parse_directions(&text)
    }
}

/// The provider expects `[lon, lat]`; our coordinates are latitude-first.
pub fn directions_body(from: Coordinate, to: Coordinate) -> DirectionsRequest {
    DirectionsRequest {
        coordinates: vec![from.to_lon_lat(), to.to_lon_lat()],
    }
}

pub fn parse_directions(text: &str) -> Result<RouteSegment, ProviderError> {
    let response: DirectionsResponse = serde_json::from_str(text).map_err(|e| {
        tracing::error!("Failed to parse DirectionsResponse: {}. Body: {}", e, text);
        e
    })?;

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or(ProviderError::NoRoute)?;

    let points = decode_geometry(&route.geometry)?;
    let instructions = route
        .segments
        .into_iter()
        .next()
        .map(|leg| {
            leg.steps
                .into_iter()
                .filter_map(|step| step.instruction)
                .collect()
        })
        .unwrap_or_default();

    Ok(RouteSegment {
        points,
        instructions,
    })
}

fn decode_geometry(encoded: &str) -> Result<Vec<Coordinate>, ProviderError> {
    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map_err(|e| ProviderError::Geometry(e.to_string()))?;
    let points: Vec<Coordinate> = line
        .0
        .into_iter()
        .map(|c| Coordinate { lat: c.y, lon: c.x })
        .collect();

    if points.len() < 2 {
        return Err(ProviderError::Geometry(format!(
            "expected at least 2 points, decoded {}",
            points.len()
        )));
    }
    Ok(points)
}

fn error_from_response(status: u16, text: String) -> ProviderError {
    // Try to parse the structured error first
    match serde_json::from_str::<OrsErrorPayload>(&text) {
        Ok(payload) => ProviderError::Api {
            status,
            code: payload.error.code,
            message: payload.error.message,
        },
        Err(_) => {
            tracing::warn!(
                "API returned non-success status: {}. Unparseable Body: {}",
                status,
                text
            );
            ProviderError::Status { status, body: text }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Google's reference polyline: (38.5, -120.2), (40.7, -120.95), (43.252, -126.453)
    const SAMPLE_POLYLINE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn sample_response(geometry: &str) -> String {
        serde_json::json!({
            "routes": [{
                "summary": {"distance": 1200.5, "duration": 300.0},
                "geometry": geometry,
                "segments": [{
                    "distance": 1200.5,
                    "steps": [
                        {"instruction": "Head north on Main Street", "type": 11},
                        {"instruction": "Turn left onto Side Road", "type": 0},
                        {"type": 10}
                    ]
                }]
            }]
        })
        .to_string()
    }

    #[test]
    fn body_is_longitude_first() {
        let start = Coordinate {
            lat: 51.5,
            lon: -0.1,
        };
        let end = Coordinate { lat: 48.8, lon: 2.3 };

        let body = serde_json::to_value(directions_body(start, end)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "coordinates": [[-0.1, 51.5], [2.3, 48.8]] })
        );
    }

    #[test]
    fn parses_geometry_and_instructions() {
        let segment = parse_directions(&sample_response(SAMPLE_POLYLINE)).unwrap();

        assert_eq!(segment.points.len(), 3);
        assert!((segment.points[0].lat - 38.5).abs() < 1e-9);
        assert!((segment.points[0].lon + 120.2).abs() < 1e-9);
        assert!((segment.points[2].lat - 43.252).abs() < 1e-9);
        assert!((segment.points[2].lon + 126.453).abs() < 1e-9);
        assert_eq!(
            segment.instructions,
            vec![
                "Head north on Main Street".to_string(),
                "Turn left onto Side Road".to_string()
            ]
        );
    }

    #[test]
    fn missing_segments_yield_no_instructions() {
        let body = serde_json::json!({
            "routes": [{ "geometry": SAMPLE_POLYLINE }]
        })
        .to_string();
        let segment = parse_directions(&body).unwrap();
        assert_eq!(segment.points.len(), 3);
        assert!(segment.instructions.is_empty());
    }

    #[test]
    fn empty_routes_is_an_error() {
        let err = parse_directions(r#"{"routes": []}"#).unwrap_err();
        assert!(matches!(err, ProviderError::NoRoute));
    }

    #[test]
    fn single_point_geometry_is_rejected() {
        let err = parse_directions(&sample_response("_p~iF~ps|U")).unwrap_err();
        assert!(matches!(err, ProviderError::Geometry(_)));
    }

    #[test]
    fn structured_error_payload_is_kept() {
        let err = error_from_response(
            404,
            r#"{"error":{"code":2010,"message":"Could not find routable point within a radius of 350.0 meters"},"info":{}}"#.to_string(),
        );
        match err {
            ProviderError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, 2010);
                assert!(message.contains("routable point"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unstructured_error_falls_back_to_status() {
        let err = error_from_response(502, "Bad Gateway".to_string());
        assert!(matches!(err, ProviderError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let client = OrsClient::new(OrsSettings {
            api_key: Some("   ".into()),
            base_url: "http://127.0.0.1:9".into(),
            ..OrsSettings::default()
        })
        .unwrap();
        assert!(!client.has_api_key());

        let from = Coordinate { lat: 1.0, lon: 1.0 };
        let to = Coordinate { lat: 2.0, lon: 2.0 };
        for _ in 0..2 {
            let err = client.fetch_segment(from, to).await.unwrap_err();
            assert!(matches!(err, ProviderError::MissingApiKey));
        }
    }
}
