//! Forward and reverse address resolution over a built [`GeoIndex`].
//!
//! Forward lookups run three stages in order and stop at the first hit:
//! exact key, range interpolation, then a fuzzy scan over every stored
//! address. Reverse lookups search a small fixed window in the spatial
//! index and return the closest numbered address.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::distance::haversine_distance;
use super::fuzzy::{normalize, similarity};
use super::index::GeoIndex;
use super::{address_key, street_key, Address, Bounds, Coord};
use crate::config::GeocoderConfig;
use crate::error::{GeoError, Result};

/// Weights of the fuzzy composite score
const STREET_WEIGHT: f64 = 10.0;
const POSTCODE_WEIGHT: f64 = 5.0;
const HOUSENUMBER_WEIGHT: f64 = 0.1;

/// Which stage produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Interpolated,
    Fuzzy,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub address: Address,
    /// 0 for exact and interpolated hits, the composite score for fuzzy
    /// hits, the distance in km for reverse hits
    pub score: f64,
    pub kind: MatchKind,
}

impl GeocodeResult {
    fn new(address: Address, score: f64, kind: MatchKind) -> Self {
        Self {
            address,
            score,
            kind,
        }
    }
}

pub struct Geocoder {
    index: GeoIndex,
    config: GeocoderConfig,
}

impl Geocoder {
    pub fn new(index: GeoIndex) -> Self {
        Self::with_config(index, GeocoderConfig::default())
    }

    pub fn with_config(index: GeoIndex, config: GeocoderConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &GeoIndex {
        &self.index
    }

    pub fn config(&self) -> &GeocoderConfig {
        &self.config
    }

    /// Resolve an address to a coordinate
    pub fn geocode(&self, street: &str, housenumber: &str, postcode: &str) -> Result<GeocodeResult> {
        if let Some(addr) = self.index.address(&address_key(street, housenumber, postcode)) {
            debug!("Exact match for {} {} {}", street, housenumber, postcode);
            return Ok(GeocodeResult::new(
                (**addr).clone(),
                0.0,
                MatchKind::Exact,
            ));
        }

        if let Some(range) = self.index.address_range(&street_key(street, postcode)) {
            if let Some(addr) = range.interpolate(housenumber) {
                debug!("Interpolated {} {} {}", street, housenumber, postcode);
                return Ok(GeocodeResult::new(addr, 0.0, MatchKind::Interpolated));
            }
        }

        self.fuzzy_search(street, housenumber, postcode)
    }

    /// Lowest composite score among addresses whose street and postcode are
    /// both similar enough to the query. Equal scores go to the smaller key.
    fn fuzzy_search(&self, street: &str, housenumber: &str, postcode: &str) -> Result<GeocodeResult> {
        // No candidate can score without a numeric target
        let target: i64 = housenumber.parse().map_err(|_| GeoError::NotFound)?;

        let query_street = normalize(street);
        let query_postcode = normalize(postcode);
        let threshold = self.config.fuzzy_threshold;

        let mut best: Option<(f64, &str, &Arc<Address>)> = None;

        for (key, addr) in self.index.addresses() {
            let street_sim = similarity(&query_street, &normalize(&addr.street));
            if street_sim <= threshold {
                continue;
            }
            let postcode_sim = similarity(&query_postcode, &normalize(&addr.postcode));
            if postcode_sim <= threshold {
                continue;
            }
            let number: i64 = match addr.housenumber.parse() {
                Ok(n) => n,
                Err(_) => continue,
            };

            let score = (1.0 - street_sim) * STREET_WEIGHT
                + (1.0 - postcode_sim) * POSTCODE_WEIGHT
                + (target as f64 - number as f64).abs() * HOUSENUMBER_WEIGHT;

            let better = match best {
                None => true,
                Some((best_score, best_key, _)) => {
                    score < best_score || (score == best_score && key.as_str() < best_key)
                }
            };
            if better {
                best = Some((score, key.as_str(), addr));
            }
        }

        match best {
            Some((score, key, addr)) => {
                debug!("Fuzzy match {} with score {:.3}", key, score);
                Ok(GeocodeResult::new((**addr).clone(), score, MatchKind::Fuzzy))
            }
            None => Err(GeoError::NotFound),
        }
    }

    /// Closest numbered address within the search window, if any.
    ///
    /// The window is a fixed number of degrees on each side, so the ground
    /// distance it covers shrinks in longitude towards the poles. Equal
    /// distances go to the smaller address key.
    pub fn reverse_geocode(&self, lat: f64, lon: f64) -> Option<GeocodeResult> {
        let query = Coord::new(lat, lon);
        let window = Bounds::around(query, self.config.reverse_window);

        let mut best: Option<(f64, &Arc<Address>)> = None;

        for point in self.index.street_index().query(&window) {
            let Some(addr) = point.data.as_address() else {
                continue;
            };
            let dist = haversine_distance(&query, &addr.coord);

            let better = match best {
                None => true,
                Some((best_dist, best_addr)) => {
                    dist < best_dist || (dist == best_dist && addr.key() < best_addr.key())
                }
            };
            if better {
                best = Some((dist, addr));
            }
        }

        best.map(|(dist, addr)| GeocodeResult::new((**addr).clone(), dist, MatchKind::Reverse))
    }
}
