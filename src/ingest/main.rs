//! One-shot address index build.
//!
//! Reads an OSM PBF extract, builds the in-memory address index, reports
//! statistics and answers any lookups given on the command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geodude::osm::load_index;
use geodude::{Config, Geocoder};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build an address index from OSM PBF data")]
struct Args {
    /// OSM PBF file or http(s) URL to import
    #[arg(short, long)]
    file: PathBuf,

    /// Optional TOML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Forward lookup as "street|housenumber|postcode" (repeatable)
    #[arg(long)]
    geocode: Vec<String>,

    /// Reverse lookup as "lat,lon" (repeatable)
    #[arg(long)]
    reverse: Vec<String>,
}

struct ForwardQuery {
    street: String,
    housenumber: String,
    postcode: String,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    // Reject malformed lookups before spending time on the import
    let forward = args
        .geocode
        .iter()
        .map(|q| parse_forward(q))
        .collect::<Result<Vec<_>>>()?;
    let reverse = args
        .reverse
        .iter()
        .map(|q| parse_reverse(q))
        .collect::<Result<Vec<_>>>()?;

    let config = Config::load_or_default(args.config.as_ref())?;

    info!("Geodude Ingest");
    info!("File: {}", args.file.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Indexing {}", args.file.display()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let (index, report) = load_index(&args.file, &config)
        .with_context(|| format!("Failed to build index from {}", args.file.display()))?;
    pb.finish_with_message("Indexing complete");

    let stream = report.stream;
    info!(
        "Stream: {} nodes, {} ways, {} relations, {} ways skipped, {} rejected, {} unreadable",
        stream.nodes,
        stream.ways,
        stream.relations,
        stream.skipped_ways,
        stream.rejected,
        stream.decode_errors
    );
    let built = report.builder;
    info!(
        "Builder: {} addresses, {} ranges ({} interpolated), {} street centroids",
        built.address_points,
        built.address_ranges,
        built.interpolated_addresses,
        built.street_centroids
    );
    let stats = index.stats();
    info!(
        "Index: {} address keys, {} ranges, {} spatial points (depth {})",
        stats.addresses, stats.address_ranges, stats.spatial_points, stats.spatial_depth
    );

    let geocoder = Geocoder::with_config(index, config.geocoder.clone());

    for q in &forward {
        let output = match geocoder.geocode(&q.street, &q.housenumber, &q.postcode) {
            Ok(result) => json!({
                "query": { "street": q.street, "housenumber": q.housenumber, "postcode": q.postcode },
                "result": result,
            }),
            Err(e) => json!({
                "query": { "street": q.street, "housenumber": q.housenumber, "postcode": q.postcode },
                "error": e.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    for &(lat, lon) in &reverse {
        let output = match geocoder.reverse_geocode(lat, lon) {
            Some(result) => json!({
                "query": { "lat": lat, "lon": lon },
                "result": result,
            }),
            None => json!({
                "query": { "lat": lat, "lon": lon },
                "error": "no address within search window",
            }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

/// Parse "street|housenumber|postcode"
fn parse_forward(raw: &str) -> Result<ForwardQuery> {
    let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
    if parts.len() != 3 {
        bail!(
            "Invalid --geocode value {:?}: expected \"street|housenumber|postcode\"",
            raw
        );
    }
    Ok(ForwardQuery {
        street: parts[0].to_string(),
        housenumber: parts[1].to_string(),
        postcode: parts[2].to_string(),
    })
}

/// Parse "lat,lon"
fn parse_reverse(raw: &str) -> Result<(f64, f64)> {
    let (lat, lon) = raw
        .split_once(',')
        .with_context(|| format!("Invalid --reverse value {:?}: expected \"lat,lon\"", raw))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .with_context(|| format!("Invalid latitude in {:?}", raw))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .with_context(|| format!("Invalid longitude in {:?}", raw))?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forward() {
        let q = parse_forward("Main Street | 123 |12345").unwrap();
        assert_eq!(q.street, "Main Street");
        assert_eq!(q.housenumber, "123");
        assert_eq!(q.postcode, "12345");

        // Empty fields are allowed, wrong arity is not
        assert!(parse_forward("Main Street||").is_ok());
        assert!(parse_forward("Main Street|123").is_err());
    }

    #[test]
    fn test_parse_reverse() {
        assert_eq!(parse_reverse("42.0, -71.0").unwrap(), (42.0, -71.0));
        assert!(parse_reverse("42.0").is_err());
        assert!(parse_reverse("north,-71.0").is_err());
    }
}
