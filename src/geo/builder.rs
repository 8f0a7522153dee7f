//! Incremental index builder fed by decoded OSM primitives.

use hashbrown::HashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::index::{GeoIndex, SpatialEntry};
use super::quadtree::Point;
use super::{Address, AddressRange, Coord};
use crate::config::IndexConfig;
use crate::error::{GeoError, Result};
use crate::osm::{Node, OsmId, Processor, Relation, Tags, Way};

const TAG_HOUSENUMBER: &str = "addr:housenumber";
const TAG_STREET: &str = "addr:street";
const TAG_CITY: &str = "addr:city";
const TAG_POSTCODE: &str = "addr:postcode";
const TAG_COUNTRY: &str = "addr:country";
const TAG_INTERPOLATION: &str = "addr:interpolation";
const TAG_NAME: &str = "name";

/// Tags that mark a way as a street
const STREET_TAGS: &[&str] = &["highway", "residential", "service", "living_street"];

/// Cached point primitive, kept so ways can resolve their node references
#[derive(Debug, Clone)]
struct CachedNode {
    coord: Coord,
    tags: Tags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuilderStats {
    pub points: usize,
    pub polylines: usize,
    pub polygon_groups: usize,
    pub address_points: usize,
    pub address_ranges: usize,
    pub interpolated_addresses: usize,
    pub street_centroids: usize,
    pub rejected: usize,
}

/// Builds a [`GeoIndex`] from a primitive stream, one primitive at a time.
pub struct GeoBuilder {
    index: GeoIndex,
    nodes: HashMap<OsmId, CachedNode>,
    stats: BuilderStats,
}

impl GeoBuilder {
    pub fn new() -> Self {
        Self::with_config(&IndexConfig::default())
    }

    pub fn with_config(config: &IndexConfig) -> Self {
        Self {
            index: GeoIndex::new(config),
            nodes: HashMap::new(),
            stats: BuilderStats::default(),
        }
    }

    pub fn stats(&self) -> BuilderStats {
        self.stats
    }

    /// Number of point primitives currently held for way resolution
    pub fn cached_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Drop the node cache. Ways referencing evicted nodes will no longer resolve.
    pub fn clear_node_cache(&mut self) {
        debug!("Clearing node cache ({} entries)", self.nodes.len());
        self.nodes = HashMap::new();
    }

    /// Finish ingestion and hand over the read-only index
    pub fn finalize(self) -> GeoIndex {
        let stats = self.index.stats();
        info!(
            "Index built: {} addresses, {} address ranges, {} spatial points (depth {})",
            stats.addresses, stats.address_ranges, stats.spatial_points, stats.spatial_depth
        );
        if self.stats.rejected > 0 {
            info!("{} primitives were rejected", self.stats.rejected);
        }
        self.index
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.stats.rejected += 1;
        }
        result
    }

    /// Store the range and synthesize one address per house number in it.
    ///
    /// Synthesis is linear in `(end - start) / step` with no upper bound, so a
    /// single mistagged way ("1" to "3000000") allocates millions of entries.
    fn process_interpolation(&mut self, way: &Way, scheme: &str) -> Result<()> {
        if way.nodes.len() < 2 {
            return Err(GeoError::validation(format!(
                "way {}: interpolation needs at least 2 nodes, got {}",
                way.id,
                way.nodes.len()
            )));
        }

        let (start_coord, start_num) = self.endpoint(way, way.nodes[0], "start")?;
        let (end_coord, end_num) = self.endpoint(way, way.nodes[way.nodes.len() - 1], "end")?;

        let range = AddressRange {
            start: start_num,
            end: end_num,
            step: interpolation_step(scheme),
            street: way.tags.get_or_empty(TAG_STREET).to_string(),
            city: way.tags.get_or_empty(TAG_CITY).to_string(),
            postcode: way.tags.get_or_empty(TAG_POSTCODE).to_string(),
            country: way.tags.get_or_empty(TAG_COUNTRY).to_string(),
            start_coord,
            end_coord,
        };

        // Non-positive steps still mean "every number" to the matcher
        let step = range.step.max(1);
        let mut synthesized = 0;
        let mut n = start_num;
        while n <= end_num {
            let addr = range.address_at(n, n.to_string());
            self.index.addresses.insert(addr.key(), Arc::new(addr));
            synthesized += 1;
            n = match n.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        debug!(
            "way {}: range {}..{} step {} on '{}' ({} addresses)",
            way.id, range.start, range.end, range.step, range.street, synthesized
        );

        self.stats.address_ranges += 1;
        self.stats.interpolated_addresses += synthesized;
        self.index.address_ranges.insert(range.key(), range);
        Ok(())
    }

    /// Coordinate and parsed house number of an interpolation endpoint
    fn endpoint(&self, way: &Way, node_id: OsmId, which: &str) -> Result<(Coord, i64)> {
        let node = self.nodes.get(&node_id).ok_or_else(|| {
            GeoError::validation(format!(
                "way {}: {} node {} not found",
                way.id, which, node_id
            ))
        })?;

        let raw = node.tags.get_or_empty(TAG_HOUSENUMBER);
        let number = raw.parse::<i64>().map_err(|e| {
            GeoError::validation(format!(
                "way {}: invalid {} house number {:?}: {}",
                way.id, which, raw, e
            ))
        })?;

        Ok((node.coord, number))
    }

    /// Mean of the cached node coordinates; None when no node resolves
    fn way_centroid(&self, way: &Way) -> Option<Coord> {
        let (sum_lat, sum_lon, count) = way
            .nodes
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .fold((0.0, 0.0, 0usize), |(lat, lon, n), node| {
                (lat + node.coord.lat, lon + node.coord.lon, n + 1)
            });

        if count == 0 {
            return None;
        }
        Some(Coord::new(
            sum_lat / count as f64,
            sum_lon / count as f64,
        ))
    }

    fn insert_spatial(&mut self, coord: Coord, entry: SpatialEntry) {
        if !self.index.street_index.insert(Point::new(coord, entry)) {
            debug!(
                "Coordinate ({}, {}) outside spatial index bounds, skipped",
                coord.lat, coord.lon
            );
        }
    }
}

impl Default for GeoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for GeoBuilder {
    fn handle_point(&mut self, node: &Node) -> Result<()> {
        self.stats.points += 1;
        self.nodes.insert(
            node.id,
            CachedNode {
                coord: node.coord(),
                tags: node.tags.clone(),
            },
        );

        let housenumber = match node.tags.get(TAG_HOUSENUMBER) {
            Some(h) if !h.is_empty() => h,
            _ => return Ok(()),
        };

        let addr = Arc::new(Address {
            housenumber: housenumber.to_string(),
            street: node.tags.get_or_empty(TAG_STREET).to_string(),
            city: node.tags.get_or_empty(TAG_CITY).to_string(),
            postcode: node.tags.get_or_empty(TAG_POSTCODE).to_string(),
            country: node.tags.get_or_empty(TAG_COUNTRY).to_string(),
            coord: node.coord(),
        });

        self.index.addresses.insert(addr.key(), Arc::clone(&addr));
        self.insert_spatial(addr.coord, SpatialEntry::Address(addr));
        self.stats.address_points += 1;
        Ok(())
    }

    fn handle_polyline(&mut self, way: &Way) -> Result<()> {
        self.stats.polylines += 1;

        if let Some(scheme) = way.tags.get(TAG_INTERPOLATION).filter(|s| !s.is_empty()) {
            let result = self.process_interpolation(way, scheme);
            return self.track(result);
        }

        if !is_street(&way.tags) {
            return Ok(());
        }
        let name = match way.tags.get(TAG_NAME) {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(()),
        };

        match self.way_centroid(way) {
            Some(center) => {
                self.insert_spatial(center, SpatialEntry::Street(name.to_string()));
                self.stats.street_centroids += 1;
                Ok(())
            }
            None => self.track(Err(GeoError::validation(format!(
                "way {}: no cached nodes to place street '{}'",
                way.id, name
            )))),
        }
    }

    fn handle_polygon_group(&mut self, _relation: &Relation) -> Result<()> {
        self.stats.polygon_groups += 1;
        Ok(())
    }
}

fn is_street(tags: &Tags) -> bool {
    STREET_TAGS.iter().any(|t| tags.has(t))
}

/// "even"/"odd" step by 2, "all" by 1, anything else is read as a number (default 1)
fn interpolation_step(scheme: &str) -> i64 {
    match scheme {
        "even" | "odd" => 2,
        "all" => 1,
        other => other.parse().unwrap_or(1),
    }
}
