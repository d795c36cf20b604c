use std::path::{Path, PathBuf};

use anyhow::{Result, bail, ensure};

use crate::common::{extract_zip, find_by_extension};
use crate::frame::GeoFrame;
use crate::io;
use crate::log::Log;
use crate::types::{Censo, Nivel};

/// URL of the georeferenced mesh for one census edition, level and state.
///
/// The 2010 meshes are shapefile archives on geoftp, keyed by lowercase
/// state code; the 2022 preliminary meshes are GeoJSON archives on the
/// census FTP mirror, keyed by uppercase state code.
pub fn malha_url(censo: Censo, nivel: Nivel, uf: &str) -> String {
    match censo {
        Censo::Censo2010 => {
            let nivel_str = match nivel {
                Nivel::Distritos => "distritos",
                Nivel::Setores => "setores_censitarios",
            };
            let uf = uf.to_ascii_lowercase();
            format!(
                "https://geoftp.ibge.gov.br/organizacao_do_territorio/malhas_territoriais/\
                 malhas_de_setores_censitarios__divisoes_intramunicipais/censo_2010/\
                 setores_censitarios_shp/{uf}/{uf}_{nivel_str}.zip"
            )
        }
        Censo::Censo2022 => {
            let sufixo = match nivel {
                Nivel::Distritos => "_Distrito",
                Nivel::Setores => "",
            };
            let nivel_str = nivel.as_str();
            let uf = uf.to_ascii_uppercase();
            format!(
                "https://ftp.ibge.gov.br/Censos/Censo_Demografico_2022/\
                 Agregados_por_Setores_Censitarios_preliminares/malha_com_atributos/\
                 {nivel_str}/json/UF/{uf}/{uf}_Malha_Preliminar{sufixo}_2022.zip"
            )
        }
    }
}

/// Cache location of a mesh archive: `<cache_dir>/<nivel>/<year>/<archive>`.
pub fn malha_cache_path(censo: Censo, nivel: Nivel, uf: &str, cache_dir: &Path) -> Result<PathBuf> {
    let url = malha_url(censo, nivel, uf);
    let filename = url.rsplit('/').next().unwrap_or_default();
    ensure!(!filename.is_empty(), "malformed mesh url: {url}");
    Ok(cache_dir
        .join(nivel.as_str())
        .join(censo.year().to_string())
        .join(filename))
}

/// Returns the cached archive for the requested mesh, downloading it
/// first if it is not there yet. A cached file is trusted as-is and
/// never re-fetched.
#[cfg(feature = "download")]
pub fn fetch_malha(
    censo: Censo,
    nivel: Nivel,
    uf: &str,
    cache_dir: &Path,
    log: &dyn Log,
) -> Result<PathBuf> {
    let url = malha_url(censo, nivel, uf);
    let path = malha_cache_path(censo, nivel, uf, cache_dir)?;

    if path.exists() {
        log.info(&format!("[cache] {} already present, reusing", path.display()));
        return Ok(path);
    }

    if let Some(dir) = path.parent() {
        crate::common::ensure_dir_exists(dir)?;
    }
    log.info(&format!("[download] {url} -> {}", path.display()));
    download_big_file(&url, &path)?;
    Ok(path)
}

/// Streams `url` into `path` through a temp file in the same directory,
/// renamed into place once the transfer completes. An interrupted
/// download never leaves a half-written cache entry.
#[cfg(feature = "download")]
fn download_big_file(url: &str, path: &Path) -> Result<()> {
    use anyhow::Context;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    let mut response = reqwest::blocking::get(url)
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    std::io::copy(&mut response, tmp.as_file_mut())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tmp.persist(path)
        .with_context(|| format!("Failed to move download into {}", path.display()))?;
    Ok(())
}

/// Extracts a cached mesh archive next to itself (once) and loads the
/// mesh it contains, whichever format the edition ships.
pub fn load_malha(zip_path: &Path, log: &dyn Log) -> Result<GeoFrame> {
    let extract_dir = zip_path.with_extension("");
    if extract_dir.is_dir() {
        log.info(&format!("[extract] {} already extracted, reusing", extract_dir.display()));
    } else {
        log.info(&format!(
            "[extract] {} -> {}",
            zip_path.display(),
            extract_dir.display()
        ));
        extract_zip(zip_path, &extract_dir)?;
    }

    if let Some(shp) = find_by_extension(&extract_dir, "shp")? {
        return io::shp::read_shapefile_frame(&shp);
    }
    for ext in ["json", "geojson"] {
        if let Some(json) = find_by_extension(&extract_dir, ext)? {
            return io::geojson::read_geojson_frame(&json);
        }
    }
    bail!("no .shp or .json mesh found in {}", extract_dir.display())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;

    use super::*;

    struct RecordingLog(RefCell<Vec<String>>);

    impl RecordingLog {
        fn new() -> Self {
            Self(RefCell::new(Vec::new()))
        }
    }

    impl Log for RecordingLog {
        fn info(&self, msg: &str) {
            self.0.borrow_mut().push(msg.to_string());
        }

        fn warn(&self, msg: &str) {
            self.0.borrow_mut().push(format!("warning: {msg}"));
        }
    }

    #[test]
    fn census_2010_urls() {
        assert_eq!(
            malha_url(Censo::Censo2010, Nivel::Setores, "SP"),
            "https://geoftp.ibge.gov.br/organizacao_do_territorio/malhas_territoriais/\
             malhas_de_setores_censitarios__divisoes_intramunicipais/censo_2010/\
             setores_censitarios_shp/sp/sp_setores_censitarios.zip",
        );
        assert_eq!(
            malha_url(Censo::Censo2010, Nivel::Distritos, "rj"),
            "https://geoftp.ibge.gov.br/organizacao_do_territorio/malhas_territoriais/\
             malhas_de_setores_censitarios__divisoes_intramunicipais/censo_2010/\
             setores_censitarios_shp/rj/rj_distritos.zip",
        );
    }

    #[test]
    fn census_2022_urls() {
        assert_eq!(
            malha_url(Censo::Censo2022, Nivel::Setores, "sp"),
            "https://ftp.ibge.gov.br/Censos/Censo_Demografico_2022/\
             Agregados_por_Setores_Censitarios_preliminares/malha_com_atributos/\
             setores/json/UF/SP/SP_Malha_Preliminar_2022.zip",
        );
        assert_eq!(
            malha_url(Censo::Censo2022, Nivel::Distritos, "SP"),
            "https://ftp.ibge.gov.br/Censos/Censo_Demografico_2022/\
             Agregados_por_Setores_Censitarios_preliminares/malha_com_atributos/\
             distritos/json/UF/SP/SP_Malha_Preliminar_Distrito_2022.zip",
        );
    }

    #[test]
    fn cache_paths_split_by_level_and_year() {
        let path = malha_cache_path(
            Censo::Censo2022,
            Nivel::Setores,
            "SP",
            Path::new("data/cache"),
        )
        .unwrap();
        assert_eq!(
            path,
            Path::new("data/cache/setores/2022/SP_Malha_Preliminar_2022.zip"),
        );

        let path = malha_cache_path(
            Censo::Censo2010,
            Nivel::Distritos,
            "SP",
            Path::new("data/cache"),
        )
        .unwrap();
        assert_eq!(path, Path::new("data/cache/distritos/2010/sp_distritos.zip"));
    }

    #[cfg(feature = "download")]
    #[test]
    fn cached_archives_are_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let expected =
            malha_cache_path(Censo::Censo2010, Nivel::Setores, "SP", dir.path()).unwrap();
        std::fs::create_dir_all(expected.parent().unwrap()).unwrap();
        std::fs::write(&expected, b"not really a zip").unwrap();

        // would need network if it tried to fetch
        let log = RecordingLog::new();
        let path =
            fetch_malha(Censo::Censo2010, Nivel::Setores, "SP", dir.path(), &log).unwrap();
        assert_eq!(path, expected);
        assert!(log.0.borrow()[0].starts_with("[cache]"));
    }

    #[test]
    fn load_malha_extracts_and_reads_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("SP_Malha_Preliminar_2022.zip");

        let geojson = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]],
                },
                "properties": { "CD_SETOR": "350010505000001" },
            }],
        });
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("SP_Malha_Preliminar_2022.json", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(geojson.to_string().as_bytes()).unwrap();
        writer.finish().unwrap();

        let log = RecordingLog::new();
        let frame = load_malha(&zip_path, &log).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.key_values("CD_SETOR").unwrap(), vec!["350010505000001"]);

        // second load reuses the extracted directory
        let frame = load_malha(&zip_path, &log).unwrap();
        assert_eq!(frame.len(), 1);
        let logs = log.0.borrow();
        assert!(logs.iter().any(|l| l.contains("already extracted")));
    }
}
