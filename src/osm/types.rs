//! Decoded OSM primitives as consumed by the index builder.

use crate::geo::Coord;

/// OSM object identifier
pub type OsmId = i64;

/// A single key/value tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Ordered tag list. Lookups return the first entry for a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Tag {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Value for `key`, or "" when absent
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.iter().any(|t| t.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

/// Point primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

impl Node {
    pub fn coord(&self) -> Coord {
        Coord::new(self.lat, self.lon)
    }
}

/// Polyline primitive, an ordered list of node references
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    pub nodes: Vec<OsmId>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberType::Node => write!(f, "node"),
            MemberType::Way => write!(f, "way"),
            MemberType::Relation => write!(f, "relation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub member_type: MemberType,
    pub reference: OsmId,
    pub role: String,
}

/// Polygon group primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    pub tags: Tags,
    pub members: Vec<Member>,
}

/// Any primitive, for single-function dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Node(Node),
    Way(Way),
    Relation(Relation),
}
