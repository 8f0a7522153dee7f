//! Address indexing and geocoding.

mod builder;
pub mod distance;
pub mod fuzzy;
mod geocoder;
mod index;
pub mod quadtree;
mod types;

pub use builder::{BuilderStats, GeoBuilder};
pub use distance::haversine_distance;
pub use geocoder::{GeocodeResult, Geocoder, MatchKind};
pub use index::{GeoIndex, IndexStats, SpatialEntry};
pub use quadtree::{Point, QuadTree};
pub use types::{address_key, street_key, Address, AddressRange, Bounds, Coord};
