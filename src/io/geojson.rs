use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail, ensure};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use polars::prelude::*;
use serde_json::{Map, Value, json};

use crate::frame::GeoFrame;

/// Reads a GeoJSON FeatureCollection of (Multi)Polygon features into a
/// [`GeoFrame`].
///
/// The column set is taken from the first feature's properties: string
/// properties become string columns, numeric properties become `f64`
/// columns, anything else is skipped.
pub fn read_geojson_frame(path: &Path) -> Result<GeoFrame> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    parse_feature_collection(&value)
}

pub(crate) fn parse_feature_collection(value: &Value) -> Result<GeoFrame> {
    ensure!(value["type"] == "FeatureCollection", "expected a GeoJSON FeatureCollection");
    let features = value["features"]
        .as_array()
        .ok_or_else(|| anyhow!("FeatureCollection has no features array"))?;

    let mut geoms = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let geom = geometry_to_multipolygon(&feature["geometry"])
            .with_context(|| format!("feature {i}"))?;
        geoms.push(geom);
    }

    let mut columns: Vec<Column> = Vec::new();
    if let Some(first) = features.first() {
        if let Some(properties) = first["properties"].as_object() {
            for (name, value) in properties {
                match value {
                    Value::String(_) => {
                        let values: Vec<Option<String>> = features
                            .iter()
                            .map(|f| f["properties"][name.as_str()].as_str().map(str::to_string))
                            .collect();
                        columns.push(Column::new(name.as_str().into(), values));
                    }
                    Value::Number(_) => {
                        let values: Vec<Option<f64>> = features
                            .iter()
                            .map(|f| f["properties"][name.as_str()].as_f64())
                            .collect();
                        columns.push(Column::new(name.as_str().into(), values));
                    }
                    _ => {}
                }
            }
        }
    }

    GeoFrame::new(DataFrame::new(columns)?, geoms)
}

fn geometry_to_multipolygon(geometry: &Value) -> Result<MultiPolygon<f64>> {
    match geometry["type"].as_str() {
        Some("Polygon") => Ok(MultiPolygon(vec![polygon_from_rings(&geometry["coordinates"])?])),
        Some("MultiPolygon") => {
            let polys = geometry["coordinates"]
                .as_array()
                .ok_or_else(|| anyhow!("MultiPolygon without a coordinates array"))?
                .iter()
                .map(polygon_from_rings)
                .collect::<Result<Vec<_>>>()?;
            Ok(MultiPolygon(polys))
        }
        other => bail!("Unsupported GeoJSON geometry type: {other:?}"),
    }
}

fn polygon_from_rings(rings: &Value) -> Result<Polygon<f64>> {
    let rings = rings.as_array().ok_or_else(|| anyhow!("polygon without a ring array"))?;
    let mut lines = rings.iter().map(line_string_from_ring).collect::<Result<Vec<_>>>()?;
    ensure!(!lines.is_empty(), "polygon with no rings");
    let exterior = lines.remove(0);
    Ok(Polygon::new(exterior, lines))
}

fn line_string_from_ring(ring: &Value) -> Result<LineString<f64>> {
    let points = ring.as_array().ok_or_else(|| anyhow!("ring is not an array"))?;
    let coords = points
        .iter()
        .map(|pt| {
            let x = pt[0].as_f64().ok_or_else(|| anyhow!("non-numeric coordinate"))?;
            let y = pt[1].as_f64().ok_or_else(|| anyhow!("non-numeric coordinate"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LineString(coords))
}

/// Writes a collection as a GeoJSON FeatureCollection, one feature per
/// row with every attribute column as a property.
pub fn write_geojson(path: &Path, frame: &GeoFrame) -> Result<()> {
    let value = frame_to_geojson(frame)?;
    fs::write(path, serde_json::to_string(&value)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub(crate) fn frame_to_geojson(frame: &GeoFrame) -> Result<Value> {
    let mut features = Vec::with_capacity(frame.len());
    for (idx, geom) in frame.geoms().iter().enumerate() {
        let mut properties = Map::new();
        for column in frame.data().get_columns() {
            let value = match column.dtype() {
                DataType::String => {
                    column.str()?.get(idx).map(|v| json!(v)).unwrap_or(Value::Null)
                }
                DataType::Float64 => {
                    column.f64()?.get(idx).map(|v| json!(v)).unwrap_or(Value::Null)
                }
                DataType::Int64 => {
                    column.i64()?.get(idx).map(|v| json!(v)).unwrap_or(Value::Null)
                }
                DataType::UInt32 => {
                    column.u32()?.get(idx).map(|v| json!(v)).unwrap_or(Value::Null)
                }
                _ => Value::Null,
            };
            properties.insert(column.name().to_string(), value);
        }
        features.push(json!({
            "type": "Feature",
            "geometry": multipolygon_to_geojson(geom),
            "properties": properties,
        }));
    }
    Ok(json!({ "type": "FeatureCollection", "features": features }))
}

fn multipolygon_to_geojson(geom: &MultiPolygon<f64>) -> Value {
    let polygons: Vec<Value> = geom
        .0
        .iter()
        .map(|poly| {
            let mut rings = vec![ring_to_coords(poly.exterior())];
            rings.extend(poly.interiors().iter().map(ring_to_coords));
            json!(rings)
        })
        .collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

fn ring_to_coords(ring: &LineString<f64>) -> Value {
    json!(ring.0.iter().map(|c| json!([c.x, c.y])).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use geo::{Area, Rect, coord};

    use super::*;

    #[test]
    fn feature_collection_round_trips() {
        let data = DataFrame::new(vec![
            Column::new("cd_setor".into(), ["350010505000001"]),
            Column::new("v0001".into(), [523.0f64]),
        ])
        .unwrap();
        let square = MultiPolygon(vec![
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon(),
        ]);
        let frame = GeoFrame::new(data, vec![square]).unwrap();

        let value = frame_to_geojson(&frame).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["properties"]["cd_setor"], "350010505000001");

        let parsed = parse_feature_collection(&value).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.key_values("cd_setor").unwrap(), vec!["350010505000001"]);
        assert!((parsed.geoms()[0].unsigned_area() - 1.0).abs() < 1e-12);
        let v: Vec<f64> = parsed
            .data()
            .column("v0001")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(v, vec![523.0]);
    }

    #[test]
    fn polygon_features_and_holes_parse() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                        [[4.0, 4.0], [4.0, 6.0], [6.0, 6.0], [6.0, 4.0], [4.0, 4.0]],
                    ],
                },
                "properties": { "cd_dist": "350010505" },
            }],
        });
        let frame = parse_feature_collection(&value).unwrap();
        assert_eq!(frame.len(), 1);
        assert!((frame.geoms()[0].unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn non_polygonal_geometry_is_an_error() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.0, 0.0] },
                "properties": {},
            }],
        });
        assert!(parse_feature_collection(&value).is_err());
    }
}
