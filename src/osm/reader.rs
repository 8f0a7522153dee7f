//! Streams OSM PBF data into a [`Processor`].

use anyhow::{bail, Context, Result};
use osmpbfreader::{OsmObj, OsmPbfReader};
use serde::Serialize;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{Member, MemberType, Node, Processor, Relation, Tags, Way};
use crate::config::Config;
use crate::geo::{BuilderStats, GeoBuilder, GeoIndex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    /// Ways dropped by the routable filter
    pub skipped_ways: u64,
    /// Primitives the processor refused
    pub rejected: u64,
    /// Objects the decoder could not read
    pub decode_errors: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestReport {
    pub stream: StreamStats,
    pub builder: BuilderStats,
}

/// Where a PBF extract comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PbfSource {
    /// `http(s)://` URL, downloaded before parsing
    Remote(reqwest::Url),
    Local(PathBuf),
}

impl PbfSource {
    /// Anything that parses as an absolute http(s) URL with a host is remote
    pub fn classify(input: &str) -> Self {
        match reqwest::Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                PbfSource::Remote(url)
            }
            _ => PbfSource::Local(PathBuf::from(input)),
        }
    }
}

/// Open a `.pbf` file or URL for streaming
pub fn open_pbf<P: AsRef<Path>>(path: P) -> Result<OsmPbfReader<BufReader<File>>> {
    let path = path.as_ref();
    let input = path
        .to_str()
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;

    if !input.to_lowercase().ends_with(".pbf") {
        bail!("Invalid file extension: {} must end with .osm.pbf", input);
    }

    let file = match PbfSource::classify(input) {
        PbfSource::Remote(url) => download_pbf(&url)?,
        PbfSource::Local(path) => {
            if !path.exists() {
                bail!("File does not exist: {}", path.display());
            }
            File::open(&path).context("Failed to open PBF file")?
        }
    };
    Ok(OsmPbfReader::new(BufReader::new(file)))
}

/// Download `url` into an unlinked temporary file, rewound for reading.
///
/// Uses the blocking client, so call it off the async workers.
fn download_pbf(url: &reqwest::Url) -> Result<File> {
    info!("Downloading {}...", url);
    let mut response = reqwest::blocking::get(url.clone())
        .with_context(|| format!("Failed to download file from {}", url))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        bail!("Failed to download {}: HTTP status {}", url, status);
    }

    if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        if !content_type.contains("application/octet-stream") {
            bail!("Invalid content type for {}: {}", url, content_type);
        }
    }

    let mut temp = tempfile::Builder::new()
        .prefix("osm-")
        .suffix(".osm.pbf")
        .tempfile()
        .context("Failed to create temporary file")?;
    let bytes = response
        .copy_to(&mut temp)
        .context("Failed to copy download to temporary file")?;
    info!("Downloaded {} bytes", bytes);

    // The path is removed here, the open handle keeps the data
    let mut file = temp.into_file();
    file.rewind().context("Failed to rewind temporary file")?;
    Ok(file)
}

/// Build an index from a PBF file or URL in a single pass
pub fn load_index<P: AsRef<Path>>(path: P, config: &Config) -> Result<(GeoIndex, IngestReport)> {
    let path = path.as_ref();
    info!("Building address index from: {}", path.display());

    let mut reader = open_pbf(path)?;
    let mut builder = GeoBuilder::with_config(&config.index);
    let stream = stream_process(&mut reader, &mut builder, config.ingest.routable_only);

    let report = IngestReport {
        stream,
        builder: builder.stats(),
    };
    Ok((builder.finalize(), report))
}

/// Push every object of a PBF stream into `processor`.
///
/// Decoder errors and rejected primitives are logged and counted; the
/// stream always runs to the end.
pub fn stream_process<R: Read, P: Processor>(
    reader: &mut OsmPbfReader<R>,
    processor: &mut P,
    routable_only: bool,
) -> StreamStats {
    info!("Processing OSM objects...");
    let stats = process_objects(reader.iter(), processor, routable_only);
    info!(
        "Processed {} nodes, {} ways, {} relations ({} rejected, {} unreadable)",
        stats.nodes, stats.ways, stats.relations, stats.rejected, stats.decode_errors
    );
    stats
}

fn process_objects<I, E, P>(objects: I, processor: &mut P, routable_only: bool) -> StreamStats
where
    I: IntoIterator<Item = std::result::Result<OsmObj, E>>,
    E: Display,
    P: Processor,
{
    let mut stats = StreamStats::default();

    for obj in objects {
        let obj = match obj {
            Ok(o) => o,
            Err(e) => {
                warn!("Error reading OSM object: {}", e);
                stats.decode_errors += 1;
                continue;
            }
        };

        let result = match &obj {
            OsmObj::Node(node) => {
                stats.nodes += 1;
                processor.handle_point(&convert_node(node))
            }
            OsmObj::Way(way) => {
                if routable_only && !is_routable(&way.tags) {
                    stats.skipped_ways += 1;
                    continue;
                }
                stats.ways += 1;
                processor.handle_polyline(&convert_way(way))
            }
            OsmObj::Relation(rel) => {
                stats.relations += 1;
                processor.handle_polygon_group(&convert_relation(rel))
            }
        };

        if let Err(e) = result {
            stats.rejected += 1;
            warn!("Rejected {:?}: {}", obj.id(), e);
        }
    }

    stats
}

fn is_routable(tags: &osmpbfreader::Tags) -> bool {
    tags.contains_key("highway") || tags.contains_key("junction")
}

fn convert_tags(tags: &osmpbfreader::Tags) -> Tags {
    tags.iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn convert_node(node: &osmpbfreader::Node) -> Node {
    Node {
        id: node.id.0,
        lat: node.lat(),
        lon: node.lon(),
        tags: convert_tags(&node.tags),
    }
}

pub fn convert_way(way: &osmpbfreader::Way) -> Way {
    Way {
        id: way.id.0,
        nodes: way.nodes.iter().map(|n| n.0).collect(),
        tags: convert_tags(&way.tags),
    }
}

pub fn convert_relation(rel: &osmpbfreader::Relation) -> Relation {
    let members = rel
        .refs
        .iter()
        .map(|r| {
            let (member_type, reference) = match r.member {
                osmpbfreader::OsmId::Node(id) => (MemberType::Node, id.0),
                osmpbfreader::OsmId::Way(id) => (MemberType::Way, id.0),
                osmpbfreader::OsmId::Relation(id) => (MemberType::Relation, id.0),
            };
            Member {
                member_type,
                reference,
                role: r.role.to_string(),
            }
        })
        .collect();

    Relation {
        id: rel.id.0,
        tags: convert_tags(&rel.tags),
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Geocoder;
    use osmpbfreader::{NodeId, OsmId, Ref, RelationId, WayId};

    fn pbf_tags(pairs: &[(&str, &str)]) -> osmpbfreader::Tags {
        let mut tags = osmpbfreader::Tags::new();
        for (k, v) in pairs {
            tags.insert((*k).into(), (*v).into());
        }
        tags
    }

    fn pbf_node(id: i64, lat: f64, lon: f64, tags: &[(&str, &str)]) -> OsmObj {
        OsmObj::Node(osmpbfreader::Node {
            id: NodeId(id),
            tags: pbf_tags(tags),
            decimicro_lat: (lat * 1e7).round() as i32,
            decimicro_lon: (lon * 1e7).round() as i32,
        })
    }

    fn pbf_way(id: i64, nodes: &[i64], tags: &[(&str, &str)]) -> OsmObj {
        OsmObj::Way(osmpbfreader::Way {
            id: WayId(id),
            tags: pbf_tags(tags),
            nodes: nodes.iter().map(|n| NodeId(*n)).collect(),
        })
    }

    #[test]
    fn test_convert_node() {
        let obj = pbf_node(7, 42.5, -71.25, &[("addr:housenumber", "10")]);
        let OsmObj::Node(raw) = &obj else {
            panic!("expected node");
        };
        let node = convert_node(raw);
        assert_eq!(node.id, 7);
        assert!((node.lat - 42.5).abs() < 1e-7);
        assert!((node.lon - -71.25).abs() < 1e-7);
        assert_eq!(node.tags.get("addr:housenumber"), Some("10"));
    }

    #[test]
    fn test_convert_relation_members() {
        let rel = osmpbfreader::Relation {
            id: RelationId(5),
            tags: pbf_tags(&[("type", "multipolygon")]),
            refs: vec![
                Ref {
                    member: OsmId::Way(WayId(11)),
                    role: "outer".into(),
                },
                Ref {
                    member: OsmId::Node(NodeId(3)),
                    role: "label".into(),
                },
            ],
        };
        let converted = convert_relation(&rel);
        assert_eq!(converted.id, 5);
        assert_eq!(converted.members.len(), 2);
        assert_eq!(converted.members[0].member_type, MemberType::Way);
        assert_eq!(converted.members[0].reference, 11);
        assert_eq!(converted.members[0].role, "outer");
        assert_eq!(converted.members[1].member_type, MemberType::Node);
    }

    #[test]
    fn test_process_objects_builds_index() {
        let objects: Vec<std::result::Result<OsmObj, String>> = vec![
            Ok(pbf_node(
                3,
                43.0,
                -72.0,
                &[("addr:housenumber", "1"), ("addr:street", "Pine Road"), ("addr:postcode", "98765")],
            )),
            Ok(pbf_node(
                4,
                43.1,
                -72.1,
                &[("addr:housenumber", "9"), ("addr:street", "Pine Road"), ("addr:postcode", "98765")],
            )),
            Err("truncated blob".to_string()),
            // References a node that never appeared
            Ok(pbf_way(
                1,
                &[3, 42],
                &[("addr:interpolation", "odd"), ("addr:street", "Pine Road")],
            )),
            Ok(pbf_way(
                2,
                &[3, 4],
                &[
                    ("addr:interpolation", "odd"),
                    ("addr:street", "Pine Road"),
                    ("addr:postcode", "98765"),
                ],
            )),
        ];

        let mut builder = GeoBuilder::new();
        let stats = process_objects(objects, &mut builder, false);
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.ways, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.decode_errors, 1);

        let geocoder = Geocoder::new(builder.finalize());
        let result = geocoder.geocode("Pine Road", "5", "98765").unwrap();
        assert!((result.address.coord.lat - 43.05).abs() < 1e-6);
        assert!((result.address.coord.lon - -72.05).abs() < 1e-6);
    }

    #[test]
    fn test_routable_only_skips_other_ways() {
        let objects: Vec<std::result::Result<OsmObj, String>> = vec![
            Ok(pbf_node(1, 1.0, 1.0, &[])),
            Ok(pbf_way(1, &[1], &[("highway", "residential"), ("name", "Elm Street")])),
            Ok(pbf_way(2, &[1], &[("junction", "roundabout")])),
            Ok(pbf_way(3, &[1], &[("building", "yes")])),
        ];

        let mut builder = GeoBuilder::new();
        let stats = process_objects(objects, &mut builder, true);
        assert_eq!(stats.ways, 2);
        assert_eq!(stats.skipped_ways, 1);
        assert_eq!(builder.stats().street_centroids, 1);
    }

    #[test]
    fn test_open_pbf_rejects_bad_paths() {
        assert!(open_pbf("map.osm").is_err());
        assert!(open_pbf("/nonexistent/map.osm.pbf").is_err());
        // Extension is checked before any download is attempted
        assert!(open_pbf("https://example.com/map.osm").is_err());
    }

    #[test]
    fn test_classify_source() {
        match PbfSource::classify("https://download.geofabrik.de/europe/monaco-latest.osm.pbf") {
            PbfSource::Remote(url) => {
                assert_eq!(url.host_str(), Some("download.geofabrik.de"));
                assert_eq!(url.path(), "/europe/monaco-latest.osm.pbf");
            }
            other => panic!("expected remote source, got {:?}", other),
        }
        assert!(matches!(
            PbfSource::classify("HTTP://example.com/a.osm.pbf"),
            PbfSource::Remote(_)
        ));

        assert_eq!(
            PbfSource::classify("/data/monaco.osm.pbf"),
            PbfSource::Local(PathBuf::from("/data/monaco.osm.pbf"))
        );
        assert_eq!(
            PbfSource::classify("monaco.osm.pbf"),
            PbfSource::Local(PathBuf::from("monaco.osm.pbf"))
        );
        // Other schemes are read from disk
        assert!(matches!(
            PbfSource::classify("file:///data/monaco.osm.pbf"),
            PbfSource::Local(_)
        ));
        assert!(matches!(
            PbfSource::classify("ftp://example.com/monaco.osm.pbf"),
            PbfSource::Local(_)
        ));
    }
}
