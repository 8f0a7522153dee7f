//! Point quadtree over lat/lon space.
//!
//! Each node is a rectangle that buffers up to `capacity` points while it is
//! a leaf. A full leaf splits into four quadrants at its center (NW, NE, SW,
//! SE, always checked in that order) and hands its points down. Points live
//! in exactly one leaf, so queries never see duplicates.
//!
//! Splitting stops at `max_depth`: a leaf at that depth keeps accepting
//! points past capacity. Without this, more than `capacity` points sharing
//! one coordinate would split forever.

use super::distance::haversine_distance;
use super::{Bounds, Coord};

/// Default depth cap; a depth-20 cell of the world root is roughly 1.9 m of latitude
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Approximate km per degree of latitude used for the radius prefilter
const KM_PER_DEGREE: f64 = 111.0;

/// A coordinate carrying an opaque payload
#[derive(Debug, Clone, PartialEq)]
pub struct Point<T> {
    pub coord: Coord,
    pub data: T,
}

impl<T> Point<T> {
    pub fn new(coord: Coord, data: T) -> Self {
        Self { coord, data }
    }
}

#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    bounds: Bounds,
    capacity: usize,
    max_depth: usize,
    depth: usize,
    points: Vec<Point<T>>,
    children: Option<Box<[QuadTree<T>; 4]>>,
}

impl<T> QuadTree<T> {
    pub fn new(bounds: Bounds, capacity: usize) -> Self {
        Self::with_max_depth(bounds, capacity, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(bounds: Bounds, capacity: usize, max_depth: usize) -> Self {
        Self {
            bounds,
            capacity,
            max_depth,
            depth: 0,
            points: Vec::with_capacity(capacity),
            children: None,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Points buffered directly in this node (always empty for internal nodes)
    pub fn points(&self) -> &[Point<T>] {
        &self.points
    }

    /// Quadrants in NW, NE, SW, SE order
    pub fn children(&self) -> Option<&[QuadTree<T>; 4]> {
        self.children.as_deref()
    }

    /// Insert a point. Returns false when the coordinate lies outside this
    /// node's rectangle and nothing was stored.
    pub fn insert(&mut self, point: Point<T>) -> bool {
        if !self.bounds.contains(&point.coord) {
            return false;
        }

        if let Some(children) = self.children.as_mut() {
            return match children
                .iter_mut()
                .find(|child| child.bounds.contains(&point.coord))
            {
                Some(child) => child.insert(point),
                None => false,
            };
        }

        if self.points.len() < self.capacity || self.depth >= self.max_depth {
            self.points.push(point);
            return true;
        }

        self.split();
        self.insert(point)
    }

    fn split(&mut self) {
        let c = self.bounds.center();
        let b = self.bounds;

        let quadrants = [
            Bounds::new(c.lat, b.max_lat, b.min_lon, c.lon), // NW
            Bounds::new(c.lat, b.max_lat, c.lon, b.max_lon), // NE
            Bounds::new(b.min_lat, c.lat, b.min_lon, c.lon), // SW
            Bounds::new(b.min_lat, c.lat, c.lon, b.max_lon), // SE
        ];
        let mut children = Box::new(quadrants.map(|q| self.child(q)));

        for p in std::mem::take(&mut self.points) {
            if let Some(child) = children
                .iter_mut()
                .find(|child| child.bounds.contains(&p.coord))
            {
                child.insert(p);
            }
        }

        self.children = Some(children);
    }

    fn child(&self, bounds: Bounds) -> QuadTree<T> {
        QuadTree {
            bounds,
            capacity: self.capacity,
            max_depth: self.max_depth,
            depth: self.depth + 1,
            points: Vec::with_capacity(self.capacity),
            children: None,
        }
    }

    /// All points inside `area` (inclusive edges), in traversal order
    pub fn query(&self, area: &Bounds) -> Vec<&Point<T>> {
        let mut results = Vec::new();
        self.collect(area, &mut results);
        results
    }

    fn collect<'a>(&'a self, area: &Bounds, out: &mut Vec<&'a Point<T>>) {
        if !self.bounds.intersects(area) {
            return;
        }

        out.extend(self.points.iter().filter(|p| area.contains(&p.coord)));

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect(area, out);
            }
        }
    }

    /// All points within `radius_km` of `center` by great-circle distance.
    ///
    /// Candidates come from a flat-earth bounding box first, so the
    /// trigonometric distance only runs on points near the center.
    pub fn query_radius(&self, center: &Coord, radius_km: f64) -> Vec<&Point<T>> {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lon_delta = radius_km / (KM_PER_DEGREE * center.lat.to_radians().cos());

        let search = Bounds::new(
            center.lat - lat_delta,
            center.lat + lat_delta,
            center.lon - lon_delta,
            center.lon + lon_delta,
        );

        self.query(&search)
            .into_iter()
            .filter(|p| haversine_distance(center, &p.coord) <= radius_km)
            .collect()
    }

    /// Drop every point and child, leaving an empty leaf
    pub fn clear(&mut self) {
        self.points = Vec::with_capacity(self.capacity);
        self.children = None;
    }

    /// Total number of points in this subtree
    pub fn size(&self) -> usize {
        let nested = self
            .children
            .as_ref()
            .map(|children| children.iter().map(QuadTree::size).sum::<usize>())
            .unwrap_or(0);
        self.points.len() + nested
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Depth of the deepest node below this one (0 for a lone leaf)
    pub fn depth(&self) -> usize {
        self.children
            .as_ref()
            .map(|children| 1 + children.iter().map(QuadTree::depth).max().unwrap_or(0))
            .unwrap_or(0)
    }
}
