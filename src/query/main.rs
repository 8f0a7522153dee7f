//! Query server for address lookups.
//!
//! Builds the address index from a PBF extract at startup and serves
//! forward and reverse geocoding over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use geodude::geo::{GeocodeResult, IndexStats, MatchKind};
use geodude::osm::load_index;
use geodude::{Config, Geocoder};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Address geocoding query server")]
struct Args {
    /// OSM PBF file or http(s) URL to index at startup
    #[arg(short, long)]
    file: PathBuf,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Optional TOML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    geocoder: Geocoder,
    stats: IndexStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_ref())?;

    info!("Geodude Query Server");
    info!("Indexing {}", args.file.display());

    // The build is CPU bound, keep it off the async workers
    let file = args.file.clone();
    let build_config = config.clone();
    let (index, report) = tokio::task::spawn_blocking(move || load_index(&file, &build_config))
        .await
        .context("Index build task failed")??;

    let stats = index.stats();
    info!(
        "Index ready: {} address keys, {} ranges, {} spatial points ({} primitives rejected)",
        stats.addresses, stats.address_ranges, stats.spatial_points, report.stream.rejected
    );

    let state = Arc::new(AppState {
        geocoder: Geocoder::with_config(index, config.geocoder),
        stats,
    });

    let app = router(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/search", get(search_handler))
        .route("/v1/reverse", get(reverse_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        index: state.stats,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    index: IndexStats,
}

/// Forward geocoding
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<FeatureCollection>, (StatusCode, Json<ErrorResponse>)> {
    // Forward lookups only fail with NotFound
    let result = state
        .geocoder
        .geocode(&params.street, &params.housenumber, &params.postcode)
        .map_err(|e| {
            debug!(
                "No match for {} {} {}: {}",
                params.street, params.housenumber, params.postcode, e
            );
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

    Ok(Json(FeatureCollection::from_results(vec![result])))
}

/// Reverse geocoding; an empty collection when nothing is close enough
async fn reverse_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQueryParams>,
) -> Json<FeatureCollection> {
    let results = state
        .geocoder
        .reverse_geocode(params.point_lat, params.point_lon)
        .into_iter()
        .collect();
    Json(FeatureCollection::from_results(results))
}

#[derive(Deserialize)]
struct SearchQueryParams {
    street: String,
    housenumber: String,
    /// Optional, matched as an empty string when absent
    #[serde(default)]
    postcode: String,
}

#[derive(Deserialize)]
struct ReverseQueryParams {
    /// Point latitude
    #[serde(rename = "point.lat")]
    point_lat: f64,
    /// Point longitude
    #[serde(rename = "point.lon")]
    point_lon: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: PointGeometry,
    properties: FeatureProperties,
}

#[derive(Debug, Serialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    /// [lon, lat]
    coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
struct FeatureProperties {
    housenumber: String,
    street: String,
    city: String,
    postcode: String,
    country: String,
    score: f64,
    match_type: MatchKind,
}

impl FeatureCollection {
    fn from_results(results: Vec<GeocodeResult>) -> Self {
        Self {
            kind: "FeatureCollection",
            features: results.into_iter().map(Feature::from).collect(),
        }
    }
}

impl From<GeocodeResult> for Feature {
    fn from(result: GeocodeResult) -> Self {
        let addr = result.address;
        Self {
            kind: "Feature",
            geometry: PointGeometry {
                kind: "Point",
                coordinates: [addr.coord.lon, addr.coord.lat],
            },
            properties: FeatureProperties {
                housenumber: addr.housenumber,
                street: addr.street,
                city: addr.city,
                postcode: addr.postcode,
                country: addr.country,
                score: result.score,
                match_type: result.kind,
            },
        }
    }
}
