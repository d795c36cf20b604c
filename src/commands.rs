use std::path::Path;

use anyhow::{Context, Result, anyhow, bail, ensure};

use crate::cli::{Cli, DownloadArgs, OutputFormat, SimilarityArgs};
use crate::frame::GeoFrame;
use crate::io;
use crate::log::{Log, QuietLog, StderrLog};
use crate::similarity::{Method, SimilarityOptions};

fn logger(verbose: u8) -> Box<dyn Log> {
    if verbose > 0 { Box::new(StderrLog) } else { Box::new(QuietLog) }
}

#[cfg(feature = "download")]
pub fn download(cli: &Cli, args: &DownloadArgs) -> Result<()> {
    use crate::types::{Censo, Nivel};

    let log = logger(cli.verbose);
    let censo = Censo::try_from(args.censo)?;
    let nivel: Nivel = args.nivel.parse()?;

    let path = crate::download::fetch_malha(censo, nivel, &args.uf, &args.cache_dir, log.as_ref())?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(not(feature = "download"))]
pub fn download(_cli: &Cli, _args: &DownloadArgs) -> Result<()> {
    bail!("censogeo was built without the download feature")
}

pub fn similarity(cli: &Cli, args: &SimilarityArgs) -> Result<()> {
    let log = logger(cli.verbose);
    let method: Method = args.method.parse()?;

    let mut reference = load_mesh(&args.reference, log.as_ref())
        .with_context(|| format!("loading reference mesh {}", args.reference.display()))?;
    let mut comparison = load_mesh(&args.comparison, log.as_ref())
        .with_context(|| format!("loading comparison mesh {}", args.comparison.display()))?;

    for query in &args.queries {
        let (column, value) = parse_query(query)?;
        let mut applied = false;
        if reference.has_column(column) {
            reference = reference.filter_equals(column, value)?;
            applied = true;
        }
        if comparison.has_column(column) {
            comparison = comparison.filter_equals(column, value)?;
            applied = true;
        }
        ensure!(applied, "filter column {column:?} not found in either mesh");
    }

    if args.keep_all && method == Method::Overlay {
        log.warn("--keep-all has no effect with the overlay method");
    }

    let opts = SimilarityOptions {
        left_key_col: args.left_key.clone(),
        right_key_col: args.right_key.clone(),
        only_intersections: !args.keep_all,
        method,
        min_intersection_radius: args.min_intersection_radius,
    };

    log.info(&format!(
        "[similarity] {} reference x {} comparison geometries, method={}",
        reference.len(),
        comparison.len(),
        method.as_str(),
    ));
    let result = crate::similarity::similarity(&reference, &comparison, &opts)?;
    log.info(&format!("[similarity] {} pairs -> {}", result.len(), args.output.display()));

    match args.format {
        OutputFormat::Csv => io::csv::write_csv(&args.output, result.data())?,
        OutputFormat::Geojson => io::geojson::write_geojson(&args.output, &result)?,
    }
    Ok(())
}

fn parse_query(query: &str) -> Result<(&str, &str)> {
    query
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid --query {query:?} (expected COL=VALUE)"))
}

/// Loads a mesh from a cached archive or a bare mesh file, by extension.
fn load_mesh(path: &Path, log: &dyn Log) -> Result<GeoFrame> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("zip") => crate::download::load_malha(path, log),
        Some("shp") => io::shp::read_shapefile_frame(path),
        Some("json") | Some("geojson") => io::geojson::read_geojson_frame(path),
        _ => bail!("unsupported mesh file type: {}", path.display()),
    }
}
