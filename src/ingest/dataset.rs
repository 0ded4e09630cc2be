//! Parcel dataset loading from per-jurisdiction shapefile directories.
//!
//! The dataset root holds one lowercased subdirectory per jurisdiction;
//! each contains an ESRI shapefile (`.shp` + `.dbf`, optionally `.prj`).
//! Loading never mutates anything on disk, so concurrent requests can
//! read the same jurisdiction safely.

use std::fs;
use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use shapefile::dbase::FieldValue;
use shapefile::Shape;
use tracing::{info, warn};

use crate::crs::Crs;
use crate::error::PipelineError;
use crate::models::{AttrValue, ParcelDataset, ParcelRecord};

/// Load the parcel dataset for a jurisdiction key.
///
/// The key is case-insensitive; keys that escape the dataset root are
/// treated the same as unknown jurisdictions.
pub fn load(data_dir: &Path, jurisdiction: &str) -> Result<ParcelDataset, PipelineError> {
    let key = jurisdiction.trim().to_lowercase();
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(PipelineError::JurisdictionNotFound(jurisdiction.to_string()));
    }

    let dir = data_dir.join(&key);
    if !dir.is_dir() {
        return Err(PipelineError::JurisdictionNotFound(key));
    }

    let shp_path = find_shapefile(&dir)?;
    info!("Using shapefile: {}", shp_path.display());

    let crs = read_prj(&shp_path)?;
    let records = read_records(&shp_path)?;
    info!("Loaded {} parcels for '{}' ({})", records.len(), key, crs);

    Ok(ParcelDataset {
        jurisdiction: key,
        crs,
        records,
    })
}

/// First `.shp` in lexicographic order, so repeated loads of a
/// multi-file directory stay deterministic.
fn find_shapefile(dir: &Path) -> Result<PathBuf, PipelineError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| PipelineError::InvalidParcelDataset(format!("{}: {e}", dir.display())))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"))
        })
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        PipelineError::InvalidParcelDataset(format!("no .shp file under {}", dir.display()))
    })
}

fn read_prj(shp_path: &Path) -> Result<Crs, PipelineError> {
    let prj_path = shp_path.with_extension("prj");
    if !prj_path.exists() {
        warn!(
            "No .prj alongside {}; assuming {}",
            shp_path.display(),
            Crs::WGS84
        );
        return Ok(Crs::WGS84);
    }

    let wkt = fs::read_to_string(&prj_path)
        .map_err(|e| PipelineError::InvalidParcelDataset(format!("{}: {e}", prj_path.display())))?;
    Crs::from_prj_wkt(&wkt).ok_or_else(|| {
        PipelineError::InvalidParcelDataset(format!(
            "no EPSG code found in {}",
            prj_path.display()
        ))
    })
}

fn read_records(shp_path: &Path) -> Result<Vec<ParcelRecord>, PipelineError> {
    let mut reader = shapefile::Reader::from_path(shp_path)
        .map_err(|e| PipelineError::InvalidParcelDataset(e.to_string()))?;

    let mut records = Vec::new();
    let mut null_shapes = 0usize;

    for (position, pair) in reader.iter_shapes_and_records().enumerate() {
        let (shape, table_row) = pair.map_err(|e| {
            PipelineError::InvalidParcelDataset(format!("record {position}: {e}"))
        })?;

        let geometry: MultiPolygon<f64> = match shape {
            Shape::NullShape => {
                null_shapes += 1;
                continue;
            }
            Shape::Polygon(polygon) => polygon.try_into().map_err(|e| {
                PipelineError::InvalidParcelDataset(format!("record {position} geometry: {e}"))
            })?,
            other => {
                return Err(PipelineError::InvalidParcelDataset(format!(
                    "record {position} is not polygonal ({})",
                    other.shapetype()
                )));
            }
        };

        let attrs = table_row
            .into_iter()
            .map(|(name, value)| (name, attr_value(value)));
        records.push(ParcelRecord::new(geometry, attrs));
    }

    if null_shapes > 0 {
        warn!("Skipped {} parcels with null geometry", null_shapes);
    }

    Ok(records)
}

fn attr_value(value: FieldValue) -> AttrValue {
    match value {
        FieldValue::Character(Some(s)) => AttrValue::Text(s),
        FieldValue::Character(None) => AttrValue::Null,
        FieldValue::Numeric(Some(n)) => AttrValue::Number(n),
        FieldValue::Numeric(None) => AttrValue::Null,
        FieldValue::Float(Some(f)) => AttrValue::Number(f64::from(f)),
        FieldValue::Float(None) => AttrValue::Null,
        FieldValue::Integer(i) => AttrValue::Number(f64::from(i)),
        FieldValue::Double(d) => AttrValue::Number(d),
        FieldValue::Currency(c) => AttrValue::Number(c),
        FieldValue::Logical(Some(b)) => AttrValue::Text(b.to_string()),
        FieldValue::Memo(s) => AttrValue::Text(s),
        _ => AttrValue::Null,
    }
}
