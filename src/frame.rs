use anyhow::{Context, Result, ensure};
use geo::MultiPolygon;
use polars::prelude::*;

/// A geometry collection: attribute columns held beside a parallel vector
/// of planar multipolygons, one geometry per row.
///
/// The attribute table may be empty (a bare geometry sequence); when it has
/// at least one column its height must match the geometry count. Row order
/// is the only link between the two, so every operation that drops or
/// reorders rows goes through this type.
#[derive(Debug, Clone)]
pub struct GeoFrame {
    data: DataFrame,
    geoms: Vec<MultiPolygon<f64>>,
}

impl GeoFrame {
    pub fn new(data: DataFrame, geoms: Vec<MultiPolygon<f64>>) -> Result<Self> {
        ensure!(
            data.width() == 0 || data.height() == geoms.len(),
            "attribute table height ({}) does not match geometry count ({})",
            data.height(),
            geoms.len(),
        );
        Ok(Self { data, geoms })
    }

    /// A collection with no attribute columns.
    pub fn from_geoms(geoms: Vec<MultiPolygon<f64>>) -> Self {
        Self { data: DataFrame::empty(), geoms }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.geoms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.geoms.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    #[inline]
    pub fn geoms(&self) -> &[MultiPolygon<f64>] {
        &self.geoms
    }

    pub fn into_parts(self) -> (DataFrame, Vec<MultiPolygon<f64>>) {
        (self.data, self.geoms)
    }

    #[inline]
    pub fn has_column(&self, name: &str) -> bool {
        self.data.get_column_names().iter().any(|c| c.as_str() == name)
    }

    /// Reduce the collection to its canonical comparison shape: at most the
    /// requested key column, plus the geometries.
    ///
    /// A requested column that does not exist is silently omitted, so bare
    /// geometry sequences pass through unchanged. The receiver is left
    /// untouched; the result is an independent copy. Standardizing an
    /// already standardized collection is a no-op.
    pub fn standardize(&self, key_col: Option<&str>) -> Result<GeoFrame> {
        let data = match key_col {
            Some(name) if self.has_column(name) => self.data.select([name])?,
            _ => DataFrame::empty(),
        };
        GeoFrame::new(data, self.geoms.clone())
    }

    /// Values of a key column, which must exist, be string-typed and have
    /// no nulls.
    pub(crate) fn key_values(&self, key_col: &str) -> Result<Vec<String>> {
        let column = self
            .data
            .column(key_col)
            .with_context(|| format!("missing key column {key_col:?}"))?;
        let ca = column
            .str()
            .with_context(|| format!("key column {key_col:?} must be string-typed"))?;
        ensure!(ca.null_count() == 0, "key column {key_col:?} contains nulls");
        Ok(ca.into_no_null_iter().map(str::to_string).collect())
    }

    /// Keep the rows where `mask` is true, attributes and geometries in step.
    pub(crate) fn filter_mask(&self, mask: &[bool]) -> Result<GeoFrame> {
        ensure!(
            mask.len() == self.len(),
            "mask length ({}) does not match row count ({})",
            mask.len(),
            self.len(),
        );
        let geoms = self
            .geoms
            .iter()
            .zip(mask)
            .filter(|&(_, &keep)| keep)
            .map(|(g, _)| g.clone())
            .collect();
        let data = if self.data.width() == 0 {
            DataFrame::empty()
        } else {
            self.data.filter(&BooleanChunked::from_slice("mask".into(), mask))?
        };
        GeoFrame::new(data, geoms)
    }

    /// Keep the rows whose `column` equals `value` (string equality).
    pub fn filter_equals(&self, column: &str, value: &str) -> Result<GeoFrame> {
        let ca = self
            .data
            .column(column)
            .with_context(|| format!("missing column {column:?}"))?
            .str()
            .with_context(|| format!("column {column:?} must be string-typed to filter on"))?;
        let mask: Vec<bool> = ca.iter().map(|v| v == Some(value)).collect();
        self.filter_mask(&mask)
    }
}

/// One reference row: a geometry plus an optional key value carried into
/// the output.
#[derive(Debug, Clone, Copy)]
pub struct GeoRecord<'a> {
    geom: &'a MultiPolygon<f64>,
    key: Option<&'a str>,
}

impl<'a> GeoRecord<'a> {
    pub fn new(geom: &'a MultiPolygon<f64>) -> Self {
        Self { geom, key: None }
    }

    pub fn with_key(geom: &'a MultiPolygon<f64>, key: &'a str) -> Self {
        Self { geom, key: Some(key) }
    }

    #[inline]
    pub fn geom(&self) -> &'a MultiPolygon<f64> {
        self.geom
    }

    #[inline]
    pub fn key(&self) -> Option<&'a str> {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![
            Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon(),
        ])
    }

    fn sample() -> GeoFrame {
        let data = DataFrame::new(vec![
            Column::new("cd_setor".into(), ["350010", "350020"]),
            Column::new("nm_mun".into(), ["Adamantina", "Adolfo"]),
        ])
        .unwrap();
        GeoFrame::new(data, vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 3.0, 1.0)]).unwrap()
    }

    #[test]
    fn height_must_match_geometry_count() {
        let data = DataFrame::new(vec![Column::new("cd".into(), ["a", "b"])]).unwrap();
        assert!(GeoFrame::new(data, vec![rect(0.0, 0.0, 1.0, 1.0)]).is_err());
    }

    #[test]
    fn standardize_keeps_only_the_key_column() {
        let frame = sample();
        let std = frame.standardize(Some("cd_setor")).unwrap();
        assert_eq!(std.data().width(), 1);
        assert_eq!(std.data().get_column_names()[0].as_str(), "cd_setor");
        assert_eq!(std.len(), 2);

        let bare = frame.standardize(None).unwrap();
        assert_eq!(bare.data().width(), 0);
        assert_eq!(bare.len(), 2);
    }

    #[test]
    fn standardize_omits_missing_columns_silently() {
        let frame = sample();
        let std = frame.standardize(Some("no_such_column")).unwrap();
        assert_eq!(std.data().width(), 0);
        assert_eq!(std.len(), 2);
    }

    #[test]
    fn standardize_is_idempotent_and_leaves_the_source_alone() {
        let frame = sample();
        let once = frame.standardize(Some("cd_setor")).unwrap();
        let twice = once.standardize(Some("cd_setor")).unwrap();
        assert_eq!(twice.data().width(), 1);
        assert_eq!(once.key_values("cd_setor").unwrap(), twice.key_values("cd_setor").unwrap());
        // the source keeps all of its columns
        assert_eq!(frame.data().width(), 2);
    }

    #[test]
    fn bare_sequences_standardize_to_themselves() {
        let frame = GeoFrame::from_geoms(vec![rect(0.0, 0.0, 1.0, 1.0)]);
        let std = frame.standardize(Some("cd_setor")).unwrap();
        assert_eq!(std.data().width(), 0);
        assert_eq!(std.len(), 1);
    }

    #[test]
    fn key_values_in_row_order() {
        let frame = sample();
        assert_eq!(frame.key_values("cd_setor").unwrap(), vec!["350010", "350020"]);
        assert!(frame.key_values("no_such_column").is_err());
    }

    #[test]
    fn key_values_rejects_non_string_columns() {
        let data = DataFrame::new(vec![Column::new("area".into(), [1.0f64, 2.0])]).unwrap();
        let frame =
            GeoFrame::new(data, vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]).unwrap();
        assert!(frame.key_values("area").is_err());
    }

    #[test]
    fn key_values_rejects_nulls() {
        let data =
            DataFrame::new(vec![Column::new("cd".into(), [Some("350010"), None])]).unwrap();
        let frame =
            GeoFrame::new(data, vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]).unwrap();
        assert!(frame.key_values("cd").is_err());
    }

    #[test]
    fn filter_equals_keeps_rows_and_geometries_in_step() {
        let frame = sample();
        let filtered = frame.filter_equals("nm_mun", "Adolfo").unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.key_values("cd_setor").unwrap(), vec!["350020"]);
        // second geometry survived, not the first
        use geo::Area;
        assert_eq!(filtered.geoms()[0].unsigned_area(), 2.0);
        assert!(frame.filter_equals("no_such_column", "x").is_err());
    }
}
