use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Coordinate, Place};
use crate::session::DEFAULT_START_NAME;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("messy-routes/", env!("CARGO_PKG_VERSION"));
/// Shorter queries are answered with an empty list.
const MIN_QUERY_CHARS: usize = 3;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoder returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    display_name: String,
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
}

/// Thin Nominatim client for place search and reverse lookup.
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn search(
        &self,
        query: &str,
        exclude: Option<&str>,
    ) -> Result<Vec<Place>, GeocodeError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let response = self.search_request(query).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let hits: Vec<SearchHit> = response.json().await?;
        Ok(places_from_hits(hits, exclude))
    }

    /// No `limit` is sent; the service default applies.
    fn search_request(&self, query: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("q", query)])
    }

    pub async fn reverse(&self, coord: Coordinate) -> Result<String, GeocodeError> {
        let lat = coord.lat.to_string();
        let lon = coord.lon.to_string();
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[("format", "json"), ("lat", lat.as_str()), ("lon", lon.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let hit: ReverseHit = response.json().await?;
        Ok(name_or_default(hit.display_name))
    }
}

fn name_or_default(name: Option<String>) -> String {
    name.filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_START_NAME.to_string())
}

/// Drops hits with unparsable or out-of-range coordinates and the one
/// matching `exclude` (the currently chosen destination).
fn places_from_hits(hits: Vec<SearchHit>, exclude: Option<&str>) -> Vec<Place> {
    hits.into_iter()
        .filter(|hit| exclude != Some(hit.display_name.as_str()))
        .filter_map(|hit| {
            let lat = hit.lat.parse().ok()?;
            let lon = hit.lon.parse().ok()?;
            let coords = Coordinate::new(lat, lon).ok()?;
            Some(Place {
                display_name: hit.display_name,
                coords,
            })
        })
        .collect()
}
