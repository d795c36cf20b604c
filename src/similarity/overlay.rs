use ahash::AHashMap;
use anyhow::{Context, Result, anyhow, ensure};
use geo::{Area, BooleanOps, BoundingRect, Buffer, MultiPolygon, Polygon, Rect};
use polars::prelude::*;

use super::SimilarityOptions;
use crate::frame::GeoFrame;

/// Bulk overlay of two keyed collections.
///
/// Produces one row per (reference key, comparison key) pair that still
/// overlaps after sliver filtering, with the dissolved intersection as its
/// geometry, its area as `inter_area` and its share of the reference key's
/// total intersected area as `inter_perc`. Reference keys with no
/// surviving overlap are simply absent. Rows come out in reference-major
/// order of first appearance.
pub(super) fn overlay_similarity(
    reference: &GeoFrame,
    comparison: &GeoFrame,
    opts: &SimilarityOptions,
) -> Result<GeoFrame> {
    let left_key_col = opts
        .left_key_col
        .as_deref()
        .ok_or_else(|| anyhow!("overlay requires a reference key column"))?;
    let right_key_col = opts
        .right_key_col
        .as_deref()
        .ok_or_else(|| anyhow!("overlay requires a comparison key column"))?;
    ensure!(
        left_key_col != right_key_col,
        "reference and comparison key columns must have distinct names (both are {left_key_col:?})",
    );
    ensure!(
        opts.min_intersection_radius >= 0.0,
        "min_intersection_radius must be non-negative (got {})",
        opts.min_intersection_radius,
    );

    let left = reference.standardize(Some(left_key_col))?;
    let right = comparison.standardize(Some(right_key_col))?;
    let left_keys = left.key_values(left_key_col).context("reference collection")?;
    let right_keys = right.key_values(right_key_col).context("comparison collection")?;

    // The radius parameter is an area threshold; erode by its square root
    // so a piece survives only if it is at least that wide everywhere.
    let erosion = opts.min_intersection_radius.sqrt();

    // Pairwise intersection, exploded into single polygons. Pairs whose
    // bounding rectangles are disjoint are skipped without running the
    // boolean op. Pieces group by key pair, so duplicate keys dissolve
    // together.
    let mut pieces: Vec<(String, String, Vec<Polygon<f64>>)> = Vec::new();
    let mut slots: AHashMap<(String, String), usize> = AHashMap::new();

    for (i, g) in left.geoms().iter().enumerate() {
        let Some(g_rect) = g.bounding_rect() else { continue };
        for (j, other) in right.geoms().iter().enumerate() {
            let Some(other_rect) = other.bounding_rect() else { continue };
            if !rects_overlap(&g_rect, &other_rect) {
                continue;
            }
            for piece in g.intersection(other).0 {
                // boundary touches come out as zero-area polygons
                if piece.unsigned_area() == 0.0 {
                    continue;
                }
                if erosion > 0.0 && piece.buffer(-erosion).0.is_empty() {
                    continue;
                }
                let pair = (left_keys[i].clone(), right_keys[j].clone());
                match slots.get(&pair) {
                    Some(&slot) => pieces[slot].2.push(piece),
                    None => {
                        slots.insert(pair.clone(), pieces.len());
                        pieces.push((pair.0, pair.1, vec![piece]));
                    }
                }
            }
        }
    }

    // Dissolve each group into one geometry and measure it.
    let mut lk = Vec::with_capacity(pieces.len());
    let mut rk = Vec::with_capacity(pieces.len());
    let mut inter_area = Vec::with_capacity(pieces.len());
    let mut geoms = Vec::with_capacity(pieces.len());
    for (left_key, right_key, group) in pieces {
        let dissolved = group
            .into_iter()
            .map(|p| MultiPolygon(vec![p]))
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| anyhow!("empty overlay group for ({left_key:?}, {right_key:?})"))?;
        inter_area.push(dissolved.unsigned_area());
        geoms.push(dissolved);
        lk.push(left_key);
        rk.push(right_key);
    }

    let data = DataFrame::new(vec![
        Column::new(left_key_col.into(), lk),
        Column::new(right_key_col.into(), rk),
        Column::new("inter_area".into(), inter_area),
    ])?
    .with_row_index("idx".into(), None)?;

    // Total intersected area per reference key, joined back onto every
    // row of that key. The join may shuffle rows, so restore the original
    // order to keep the geometry vector aligned.
    let totals = data
        .clone()
        .lazy()
        .group_by([col(left_key_col)])
        .agg([col("inter_area").sum().alias("setor_weighted_area")])
        .collect()?;
    let mut data = data
        .inner_join(&totals, [left_key_col], [left_key_col])?
        .sort(["idx"], SortMultipleOptions::default())?;

    let perc: Vec<f64> = {
        let area = data.column("inter_area")?.f64()?;
        let total = data.column("setor_weighted_area")?.f64()?;
        area.into_no_null_iter()
            .zip(total.into_no_null_iter())
            .map(|(a, t)| a / t)
            .collect()
    };
    data.with_column(Column::new("inter_perc".into(), perc))?;
    let data = data.drop("idx")?.drop("setor_weighted_area")?;

    GeoFrame::new(data, geoms)
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}
