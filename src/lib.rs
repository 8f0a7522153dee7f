//! Geodude - offline address geocoding over OpenStreetMap extracts
//!
//! The library builds an in-memory address index from OSM primitives and
//! answers forward and reverse lookups against it. The `ingest` and `query`
//! binaries wrap it as a one-shot CLI and an HTTP service.

pub mod config;
pub mod error;
pub mod geo;
pub mod osm;

pub use config::Config;
pub use error::{GeoError, Result};
pub use geo::{Address, Coord, GeoBuilder, GeoIndex, GeocodeResult, Geocoder, MatchKind};
