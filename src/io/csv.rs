use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::io::SerWriter;
use polars::prelude::{CsvWriter, DataFrame};

/// Writes the attribute table to `path`. Geometries have no CSV
/// representation and are dropped.
pub fn write_csv(path: &Path, data: &DataFrame) -> Result<()> {
    let mut data = data.clone();
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(file)
        .finish(&mut data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use polars::prelude::Column;

    use super::*;

    #[test]
    fn header_and_rows_come_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("similarity.csv");
        let data = DataFrame::new(vec![
            Column::new("cd_setor".into(), ["350010", "350020"]),
            Column::new("inter_perc".into(), [0.25f64, 0.75]),
        ])
        .unwrap();

        write_csv(&path, &data).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("cd_setor,inter_perc"));
        assert_eq!(lines.next(), Some("350010,0.25"));
    }
}
