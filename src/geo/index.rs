//! The built address index: exact lookup table, interpolation ranges and
//! the spatial index used for reverse lookups.

use hashbrown::HashMap;
use serde::Serialize;
use std::sync::Arc;

use super::quadtree::QuadTree;
use super::{Address, AddressRange, Bounds};
use crate::config::IndexConfig;

/// Payload of a spatial index point
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialEntry {
    /// A numbered address from a point primitive
    Address(Arc<Address>),
    /// Centroid of a named street
    Street(String),
}

impl SpatialEntry {
    pub fn as_address(&self) -> Option<&Arc<Address>> {
        match self {
            SpatialEntry::Address(addr) => Some(addr),
            SpatialEntry::Street(_) => None,
        }
    }
}

/// Read-only after the builder hands it over
#[derive(Debug, Clone)]
pub struct GeoIndex {
    /// Key: lower-cased "street:housenumber:postcode"
    pub(crate) addresses: HashMap<String, Arc<Address>>,
    /// Key: lower-cased "street:postcode"
    pub(crate) address_ranges: HashMap<String, AddressRange>,
    pub(crate) street_index: QuadTree<SpatialEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub addresses: usize,
    pub address_ranges: usize,
    pub spatial_points: usize,
    pub spatial_depth: usize,
}

impl GeoIndex {
    /// Empty index whose spatial root covers the whole globe
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            addresses: HashMap::new(),
            address_ranges: HashMap::new(),
            street_index: QuadTree::with_max_depth(
                Bounds::world(),
                config.capacity,
                config.max_depth,
            ),
        }
    }

    /// Exact lookup by composite address key
    pub fn address(&self, key: &str) -> Option<&Arc<Address>> {
        self.addresses.get(key)
    }

    /// Range lookup by composite street key
    pub fn address_range(&self, key: &str) -> Option<&AddressRange> {
        self.address_ranges.get(key)
    }

    pub fn addresses(&self) -> impl Iterator<Item = (&String, &Arc<Address>)> {
        self.addresses.iter()
    }

    pub fn address_ranges(&self) -> impl Iterator<Item = (&String, &AddressRange)> {
        self.address_ranges.iter()
    }

    pub fn street_index(&self) -> &QuadTree<SpatialEntry> {
        &self.street_index
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            addresses: self.addresses.len(),
            address_ranges: self.address_ranges.len(),
            spatial_points: self.street_index.size(),
            spatial_depth: self.street_index.depth(),
        }
    }
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new(&IndexConfig::default())
    }
}
