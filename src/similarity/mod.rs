//! Area-weighted overlap between two geometry collections.
//!
//! The reference collection is the one being explained: every output row
//! says how much of a reference geometry a comparison geometry covers.
//! Ratios are computed in the coordinate plane of the inputs; both
//! collections must share one.

mod overlay;
mod row;

use std::str::FromStr;

use anyhow::{Error, Result, anyhow, bail};
use polars::prelude::*;

use crate::frame::{GeoFrame, GeoRecord};

/// Algorithm used to relate reference and comparison geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// Pairwise intersection geometries and their area ratios.
    #[default]
    Intersection,
    /// Pairwise differences; ratios measure the covered share without
    /// materializing the intersection.
    Difference,
    /// Bulk overlay of both collections with sliver filtering and
    /// per-reference-key reweighting. Requires key columns on both sides.
    Overlay,
}

impl Method {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Intersection => "intersection",
            Method::Difference => "difference",
            Method::Overlay => "overlay",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Parses the CLI spelling: `overlay` matches in any case, the other
    /// two methods exactly.
    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("overlay") {
            return Ok(Method::Overlay);
        }
        match s {
            "intersection" => Ok(Method::Intersection),
            "difference" => Ok(Method::Difference),
            _ => bail!("unsupported method: {s:?} (expected intersection, difference or overlay)"),
        }
    }
}

/// Tuning knobs for [`similarity`] and [`record_similarity`].
#[derive(Debug, Clone)]
pub struct SimilarityOptions {
    /// Key column read from the reference collection and prepended to
    /// every output row. Required by [`Method::Overlay`].
    pub left_key_col: Option<String>,
    /// Key column carried over from the comparison collection. Required
    /// by [`Method::Overlay`].
    pub right_key_col: Option<String>,
    /// Drop pairs whose ratio is not strictly positive before reweighting.
    pub only_intersections: bool,
    pub method: Method,
    /// Overlay only: intersection pieces that vanish under an erosion of
    /// the square root of this value are discarded as slivers.
    pub min_intersection_radius: f64,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self {
            left_key_col: None,
            right_key_col: None,
            only_intersections: true,
            method: Method::Intersection,
            min_intersection_radius: 10.0,
        }
    }
}

/// Compare every record of `reference` against `comparison`.
///
/// The row methods standardize both collections, walk the reference in
/// row order and stack the per-record results, so output rows group by
/// reference record. [`Method::Overlay`] runs the bulk pipeline instead.
/// Output columns: the reference key (when configured), the comparison
/// attributes kept by standardization, `inter_area` (intersection method
/// only) and `inter_perc`.
pub fn similarity(
    reference: &GeoFrame,
    comparison: &GeoFrame,
    opts: &SimilarityOptions,
) -> Result<GeoFrame> {
    if opts.method == Method::Overlay {
        return overlay::overlay_similarity(reference, comparison, opts);
    }

    let left = reference.standardize(opts.left_key_col.as_deref())?;
    let right = comparison.standardize(opts.right_key_col.as_deref())?;
    let left_keys = match opts.left_key_col.as_deref() {
        Some(name) if left.has_column(name) => Some(left.key_values(name)?),
        _ => None,
    };

    let mut data: Option<DataFrame> = None;
    let mut geoms = Vec::new();
    for (i, geom) in left.geoms().iter().enumerate() {
        let key = left_keys.as_ref().map(|keys| keys[i].as_str());
        let part = row::row_similarity(geom, key, &right, opts)?;
        let (part_data, part_geoms) = part.into_parts();
        data = Some(match data {
            Some(acc) => acc.vstack(&part_data)?,
            None => part_data,
        });
        geoms.extend(part_geoms);
    }

    let data = data.ok_or_else(|| anyhow!("reference collection is empty"))?;
    GeoFrame::new(data, geoms)
}

/// Compare a single reference record against `comparison`.
///
/// Row methods go straight to the per-record pipeline. Overlay wraps the
/// record into a one-row collection first and therefore needs both the
/// key column name and a key value.
pub fn record_similarity(
    record: GeoRecord<'_>,
    comparison: &GeoFrame,
    opts: &SimilarityOptions,
) -> Result<GeoFrame> {
    if opts.method == Method::Overlay {
        let name = opts
            .left_key_col
            .as_deref()
            .ok_or_else(|| anyhow!("overlay requires a reference key column"))?;
        let key = record
            .key()
            .ok_or_else(|| anyhow!("overlay requires a key value on the reference record"))?;
        let reference = GeoFrame::new(
            DataFrame::new(vec![Column::new(name.into(), vec![key])])?,
            vec![record.geom().clone()],
        )?;
        return overlay::overlay_similarity(&reference, comparison, opts);
    }

    let right = comparison.standardize(opts.right_key_col.as_deref())?;
    row::row_similarity(record.geom(), record.key(), &right, opts)
}
