use std::path::Path;

use anyhow::{Context, Result, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use polars::prelude::*;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Reader, Shape};

use crate::frame::GeoFrame;

/// Reads a `.shp` mesh (with its `.dbf` attribute table) into a [`GeoFrame`].
///
/// Character fields become string columns (trimmed; dbase pads with
/// spaces), numeric and float fields become `f64` columns, other field
/// types are skipped. Every shape must be polygonal.
pub fn read_shapefile_frame(path: &Path) -> Result<GeoFrame> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut shapes = Vec::with_capacity(reader.shape_count()?);
    let mut records = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;
        shapes.push(shape);
        records.push(record);
    }

    let geoms = shapes
        .into_iter()
        .enumerate()
        .map(|(i, shape)| {
            shape_to_multipolygon(shape).with_context(|| format!("shape {i} of {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    GeoFrame::new(records_to_dataframe(&records)?, geoms)
}

fn shape_to_multipolygon(shape: Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Ok(shp_to_geo(&polygon)),
        other => bail!("Unsupported shape type: {}", other),
    }
}

/// Converts a shapefile polygon to a geo MultiPolygon, pairing each outer
/// ring with the inner rings that follow it in ring order.
fn shp_to_geo(polygon: &shapefile::Polygon) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in polygon.rings() {
        match ring {
            PolygonRing::Outer(points) => {
                if let Some(ext) = exterior.take() {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(ring_to_line_string(points));
            }
            PolygonRing::Inner(points) => holes.push(ring_to_line_string(points)),
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}

fn ring_to_line_string(points: &[shapefile::Point]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> =
        points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    // rings must be closed for the boolean ops downstream
    if !coords.is_empty() && coords.first() != coords.last() {
        let first = coords[0];
        coords.push(first);
    }
    LineString(coords)
}

/// One column per dbase field, typed from the first record.
fn records_to_dataframe(records: &[Record]) -> Result<DataFrame> {
    let Some(first) = records.first() else {
        return Ok(DataFrame::empty());
    };

    let mut columns: Vec<Column> = Vec::new();
    for (field, value) in first.clone() {
        match value {
            FieldValue::Character(_) => {
                let values = records
                    .iter()
                    .map(|record| match record.get(&field) {
                        Some(FieldValue::Character(v)) => {
                            Ok(v.as_deref().map(|s| s.trim().to_string()))
                        }
                        _ => bail!("missing or mistyped character field: {field}"),
                    })
                    .collect::<Result<Vec<_>>>()?;
                columns.push(Column::new(field.as_str().into(), values));
            }
            FieldValue::Numeric(_) => {
                let values = records
                    .iter()
                    .map(|record| match record.get(&field) {
                        Some(FieldValue::Numeric(v)) => Ok(*v),
                        _ => bail!("missing or mistyped numeric field: {field}"),
                    })
                    .collect::<Result<Vec<_>>>()?;
                columns.push(Column::new(field.as_str().into(), values));
            }
            FieldValue::Float(_) => {
                let values = records
                    .iter()
                    .map(|record| match record.get(&field) {
                        Some(FieldValue::Float(v)) => Ok(v.map(f64::from)),
                        _ => bail!("missing or mistyped float field: {field}"),
                    })
                    .collect::<Result<Vec<_>>>()?;
                columns.push(Column::new(field.as_str().into(), values));
            }
            _ => {} // dates, logicals and memos are not mesh attributes
        }
    }

    Ok(DataFrame::new(columns)?)
}
