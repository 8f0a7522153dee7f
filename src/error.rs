//! Error types shared by the index builder and the geocoder.

use thiserror::Error;

/// Failures local to a single primitive or a single query.
///
/// None of these are fatal: a rejected primitive leaves the rest of the
/// stream untouched, and a failed lookup leaves the index untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    /// A primitive could not be turned into index entries
    #[error("invalid primitive: {0}")]
    Validation(String),

    /// Forward geocoding exhausted the exact, interpolated and fuzzy stages
    #[error("no matching address found")]
    NotFound,
}

impl GeoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GeoError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
