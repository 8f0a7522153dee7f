//! Push-style interface between a primitive decoder and its consumers.

use super::{Node, Primitive, Relation, Way};
use crate::error::Result;

/// Consumer of decoded primitives.
///
/// An error rejects only the primitive that produced it; callers keep
/// feeding the rest of the stream.
pub trait Processor {
    fn handle_point(&mut self, node: &Node) -> Result<()>;

    fn handle_polyline(&mut self, way: &Way) -> Result<()>;

    fn handle_polygon_group(&mut self, relation: &Relation) -> Result<()>;

    fn ingest(&mut self, primitive: &Primitive) -> Result<()> {
        match primitive {
            Primitive::Node(node) => self.handle_point(node),
            Primitive::Way(way) => self.handle_polyline(way),
            Primitive::Relation(relation) => self.handle_polygon_group(relation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::Tags;

    #[derive(Default)]
    struct Counter {
        points: usize,
        polylines: usize,
        groups: usize,
    }

    impl Processor for Counter {
        fn handle_point(&mut self, _node: &Node) -> Result<()> {
            self.points += 1;
            Ok(())
        }

        fn handle_polyline(&mut self, _way: &Way) -> Result<()> {
            self.polylines += 1;
            Ok(())
        }

        fn handle_polygon_group(&mut self, _relation: &Relation) -> Result<()> {
            self.groups += 1;
            Ok(())
        }
    }

    #[test]
    fn test_ingest_dispatches_by_kind() {
        let mut counter = Counter::default();
        let primitives = vec![
            Primitive::Node(Node {
                id: 1,
                lat: 0.0,
                lon: 0.0,
                tags: Tags::new(),
            }),
            Primitive::Way(Way {
                id: 2,
                nodes: vec![1],
                tags: Tags::new(),
            }),
            Primitive::Relation(Relation {
                id: 3,
                tags: Tags::new(),
                members: vec![],
            }),
            Primitive::Node(Node {
                id: 4,
                lat: 1.0,
                lon: 1.0,
                tags: Tags::new(),
            }),
        ];

        for p in &primitives {
            counter.ingest(p).unwrap();
        }

        assert_eq!(counter.points, 2);
        assert_eq!(counter.polylines, 1);
        assert_eq!(counter.groups, 1);
    }
}
