//! Format-specific reading and writing.
//!
//! - `shp` - ESRI shapefiles, the 2010 mesh distribution format
//! - `geojson` - GeoJSON FeatureCollections, the 2022 format and an export target
//! - `csv` - attribute-only export of similarity tables

pub mod csv;
pub mod geojson;
pub mod shp;
