//! OSM primitive model and the streaming adapter that feeds it.

mod processor;
mod reader;
mod types;

pub use processor::Processor;
pub use reader::{
    convert_node, convert_relation, convert_way, load_index, open_pbf, stream_process,
    IngestReport, PbfSource, StreamStats,
};
pub use types::{Member, MemberType, Node, OsmId, Primitive, Relation, Tag, Tags, Way};
