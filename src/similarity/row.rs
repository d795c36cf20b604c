use anyhow::{Result, bail, ensure};
use geo::{Area, BooleanOps, MultiPolygon};
use polars::prelude::*;

use super::{Method, SimilarityOptions};
use crate::frame::GeoFrame;

/// Intersection of one reference geometry with every comparison record.
///
/// Output rows carry the comparison attributes plus `inter_area` and
/// `inter_perc` (share of the reference covered); geometries are the
/// pairwise intersections.
fn intersection_similarity(
    geom: &MultiPolygon<f64>,
    comparison: &GeoFrame,
    only_intersections: bool,
) -> Result<GeoFrame> {
    let ref_area = geom.unsigned_area();
    ensure!(ref_area > 0.0, "reference geometry has zero area");

    let mut geoms = Vec::with_capacity(comparison.len());
    let mut inter_area = Vec::with_capacity(comparison.len());
    let mut inter_perc = Vec::with_capacity(comparison.len());
    for other in comparison.geoms() {
        let inter = other.intersection(geom);
        let area = inter.unsigned_area();
        inter_area.push(area);
        inter_perc.push(area / ref_area);
        geoms.push(inter);
    }

    let mut columns = comparison.data().get_columns().to_vec();
    columns.push(Column::new("inter_area".into(), inter_area.as_slice()));
    columns.push(Column::new("inter_perc".into(), inter_perc.as_slice()));
    let result = GeoFrame::new(DataFrame::new(columns)?, geoms)?;

    if only_intersections {
        let mask: Vec<bool> = inter_perc.iter().map(|&p| p > 0.0).collect();
        return result.filter_mask(&mask);
    }
    Ok(result)
}

/// Same ratios measured through the difference: a comparison record that
/// leaves little of the reference behind covers much of it. No
/// intersection geometry is materialized, so there is no `inter_area`
/// column and the output geometries are the differences.
fn difference_similarity(
    geom: &MultiPolygon<f64>,
    comparison: &GeoFrame,
    only_intersections: bool,
) -> Result<GeoFrame> {
    let ref_area = geom.unsigned_area();
    ensure!(ref_area > 0.0, "reference geometry has zero area");

    let mut geoms = Vec::with_capacity(comparison.len());
    let mut inter_perc = Vec::with_capacity(comparison.len());
    for other in comparison.geoms() {
        let diff = geom.difference(other);
        inter_perc.push(1.0 - diff.unsigned_area() / ref_area);
        geoms.push(diff);
    }

    let mut columns = comparison.data().get_columns().to_vec();
    columns.push(Column::new("inter_perc".into(), inter_perc.as_slice()));
    let result = GeoFrame::new(DataFrame::new(columns)?, geoms)?;

    if only_intersections {
        let mask: Vec<bool> = inter_perc.iter().map(|&p| p > 0.0).collect();
        return result.filter_mask(&mask);
    }
    Ok(result)
}

/// Ratios for one reference record against an already standardized
/// comparison collection, reweighted so they sum to 1.
///
/// When both a key column name and a key value are given, the value is
/// prepended as the first output column.
pub(super) fn row_similarity(
    geom: &MultiPolygon<f64>,
    key: Option<&str>,
    comparison: &GeoFrame,
    opts: &SimilarityOptions,
) -> Result<GeoFrame> {
    let result = match opts.method {
        Method::Intersection => intersection_similarity(geom, comparison, opts.only_intersections)?,
        Method::Difference => difference_similarity(geom, comparison, opts.only_intersections)?,
        Method::Overlay => bail!("overlay is not a per-record method"),
    };
    let (mut data, geoms) = result.into_parts();

    if let (Some(name), Some(value)) = (opts.left_key_col.as_deref(), key) {
        data.insert_column(0, Column::new(name.into(), vec![value; data.height()]))?;
    }

    // Reweight so the surviving ratios for this reference total exactly 1.
    let (total, reweighted) = {
        let perc = data.column("inter_perc")?.f64()?;
        let total: f64 = perc.into_no_null_iter().sum();
        let reweighted: Vec<f64> = perc.into_no_null_iter().map(|p| p / total).collect();
        (total, reweighted)
    };
    match key {
        Some(k) => ensure!(
            total > 0.0,
            "reference record {k:?} has no comparison match with positive overlap"
        ),
        None => ensure!(
            total > 0.0,
            "reference record has no comparison match with positive overlap"
        ),
    }
    data.replace("inter_perc", Series::new("inter_perc".into(), reweighted))?;

    GeoFrame::new(data, geoms)
}
