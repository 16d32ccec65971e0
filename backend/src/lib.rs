pub mod anchors;
pub mod config;
pub mod detour;
pub mod error;
pub mod geocode;
pub mod gpx_export;
pub mod models;
pub mod provider;
pub mod routing;
pub mod scoring;
pub mod session;

use std::{num::NonZeroUsize, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::anchors::AnchorCatalog;
use crate::config::AppConfig;
use crate::detour::DetourSynthesizer;
use crate::error::{RouteError, StartupError};
use crate::geocode::NominatimClient;
use crate::gpx_export::encode_route_as_gpx;
use crate::models::{
    ApiError, Coordinate, DestinationRequest, Place, RouteRequest, RouteResponse,
    SelectionResult, SessionCreated, SessionSnapshot, StartRequest,
};
use crate::provider::{CachedFetcher, OrsClient, SegmentFetcher};
use crate::routing::approximate_distance_km;
use crate::session::{DEFAULT_START_NAME, SessionError, SessionStore};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<DetourSynthesizer>,
    pub sessions: Arc<SessionStore>,
    pub geocoder: Arc<NominatimClient>,
}

impl AppState {
    pub fn new(synthesizer: DetourSynthesizer, geocoder: NominatimClient) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
            sessions: Arc::new(SessionStore::new()),
            geocoder: Arc::new(geocoder),
        }
    }

    pub fn with_session_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.sessions = Arc::new(SessionStore::with_capacity(capacity));
        self
    }

    /// Wires the ORS client, segment cache, anchor catalog and geocoder.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let catalog = match &config.anchors_path {
            Some(path) => {
                let catalog = AnchorCatalog::from_file(path)?;
                tracing::info!("loaded {} anchors from {}", catalog.len(), path.display());
                catalog
            }
            None => AnchorCatalog::default_catalog(),
        };

        let client = OrsClient::new(config.ors.clone())?;
        if !client.has_api_key() {
            tracing::warn!("ORS_API_KEY is not set; routes will use the offline jitter path");
        }
        let fetcher: Arc<dyn SegmentFetcher> = match config.segment_cache_size {
            Some(capacity) => Arc::new(CachedFetcher::new(client, capacity)),
            None => Arc::new(client),
        };

        let synthesizer = DetourSynthesizer::new(Arc::new(catalog), fetcher)
            .with_options(config.synthesis);
        let geocoder = NominatimClient::new(config.nominatim_base_url.clone())?;

        Ok(Self::new(synthesizer, geocoder).with_session_capacity(config.session_capacity))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/route", post(route_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", get(session_handler))
        .route("/api/sessions/:id/start", put(start_handler))
        .route("/api/sessions/:id/destination", post(destination_handler))
        .route("/api/search", get(search_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_handler(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> ApiResult<RouteResponse> {
    req.start.validate().map_err(RouteError::from)?;
    req.end.validate().map_err(RouteError::from)?;

    let route = state.synthesizer.synthesize(req.start, req.end).await;
    Ok(Json(build_response(route)?))
}

fn build_response(route: SelectionResult) -> Result<RouteResponse, RouteError> {
    let distance_km = approximate_distance_km(&route.points);
    let gpx_base64 = encode_route_as_gpx(&route)?;
    Ok(RouteResponse {
        route,
        distance_km,
        gpx_base64,
    })
}

async fn create_session_handler(State(state): State<AppState>) -> Json<SessionCreated> {
    let id = state.sessions.create().await;
    tracing::info!("created session {id}");
    Json(SessionCreated { id: id.to_string() })
}

async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionSnapshot> {
    let snapshot = state
        .sessions
        .with_session(id, |session| session.snapshot(id))
        .await
        .map_err(RouteError::from)?;
    Ok(Json(snapshot))
}

async fn start_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartRequest>,
) -> ApiResult<SessionSnapshot> {
    let coord = Coordinate::new(req.lat, req.lon).map_err(RouteError::from)?;

    let name = match req.name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name,
        None => state.geocoder.reverse(coord).await.unwrap_or_else(|err| {
            tracing::warn!("reverse geocoding failed for {:?}: {}", coord, err);
            DEFAULT_START_NAME.to_string()
        }),
    };

    let snapshot = state
        .sessions
        .with_session(id, |session| {
            session.set_start(coord, name);
            session.snapshot(id)
        })
        .await
        .map_err(RouteError::from)?;
    Ok(Json(snapshot))
}

/// Commits a destination and waits for its synthesis. The spawned task
/// stores the result itself, so a dropped request still updates the session.
/// A newer commit on the same session aborts this one, which then answers 409.
async fn destination_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DestinationRequest>,
) -> ApiResult<SessionSnapshot> {
    let coord = Coordinate::new(req.lat, req.lon).map_err(RouteError::from)?;

    let pending = state
        .sessions
        .with_session(id, |session| session.commit_destination(coord, req.display_name))
        .await
        .and_then(|committed| committed)
        .map_err(RouteError::from)?;

    let synthesizer = state.synthesizer.clone();
    let sessions = state.sessions.clone();
    let task = tokio::spawn(async move {
        let result = synthesizer.synthesize(pending.start, pending.end).await;
        sessions
            .with_session(id, |session| {
                if session.apply(&pending, result) {
                    Ok(session.snapshot(id))
                } else {
                    Err(SessionError::Superseded)
                }
            })
            .await
            .and_then(|applied| applied)
    });
    state
        .sessions
        .with_session(id, |session| session.track(&pending, task.abort_handle()))
        .await
        .map_err(RouteError::from)?;

    match task.await {
        Ok(applied) => Ok(Json(applied.map_err(RouteError::from)?)),
        Err(err) if err.is_cancelled() => Err(RouteError::from(SessionError::Superseded).into()),
        Err(err) => Err(RouteError::Task(err.to_string()).into()),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    exclude: Option<String>,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<Place>> {
    let places = state
        .geocoder
        .search(&params.q, params.exclude.as_deref())
        .await
        .map_err(RouteError::from)?;
    Ok(Json(places))
}
