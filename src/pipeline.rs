//! The geospatial impact filter pipeline.
//!
//! Stages run strictly in order: load, reconcile references, spatial
//! match, eligibility filter, derive fields, project. Each invocation
//! is synchronous and stateless; it returns a complete row sequence
//! (possibly empty) or exactly one terminal error.

use std::path::Path;

use tracing::info;

use crate::config::{Config, FilterConfig};
use crate::derive::FieldDeriver;
use crate::error::PipelineError;
use crate::filter;
use crate::ingest::{boundary::StormBoundary, dataset};
use crate::models::{OutputRow, ParcelDataset};
use crate::reproject;
use crate::sjoin::{self, ParcelSpatialIndex};

/// Run the pipeline against an already-loaded boundary and dataset.
pub fn run(
    boundary: StormBoundary,
    dataset: &ParcelDataset,
    filter_config: &FilterConfig,
) -> Result<Vec<OutputRow>, PipelineError> {
    let boundary = reproject::reconcile(boundary, dataset.crs)?;

    let index = ParcelSpatialIndex::build(dataset);
    let matched = sjoin::intersecting_parcels(dataset, &boundary, &index)?;

    let rules = filter::standard_rules(filter_config);
    let eligible = filter::apply_rules(dataset, &matched, &rules);
    info!(
        "{} of {} matched parcels remain eligible",
        eligible.len(),
        matched.len()
    );

    let deriver = FieldDeriver::new(dataset.crs)?;
    let mut rows = Vec::with_capacity(eligible.len());
    for position in eligible {
        let record = &dataset.records[position];
        let derived = deriver.derive(record)?;
        rows.push(OutputRow::project(record, &derived)?);
    }
    Ok(rows)
}

/// Full request path: boundary bytes + jurisdiction key.
pub fn analyze_slice(
    boundary_bytes: &[u8],
    jurisdiction: &str,
    config: &Config,
) -> Result<Vec<OutputRow>, PipelineError> {
    let boundary = StormBoundary::from_slice(boundary_bytes)?;
    let dataset = dataset::load(&config.global.data_dir, jurisdiction)?;
    run(boundary, &dataset, &config.filter)
}

/// Full request path from a boundary file on disk.
pub fn analyze_path(
    boundary_path: &Path,
    jurisdiction: &str,
    config: &Config,
) -> Result<Vec<OutputRow>, PipelineError> {
    let boundary = StormBoundary::from_path(boundary_path)?;
    let dataset = dataset::load(&config.global.data_dir, jurisdiction)?;
    run(boundary, &dataset, &config.filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{Crs, CrsTransform};
    use crate::models::{AttrValue, ParcelRecord};
    use geo::{polygon, MultiPolygon};

    fn square_at(x: f64, y: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + side, y: y),
            (x: x + side, y: y + side),
            (x: x, y: y + side),
            (x: x, y: y),
        ]])
    }

    fn parcel(
        geometry: MultiPolygon<f64>,
        owner: &str,
        mail: &str,
        year: AttrValue,
    ) -> ParcelRecord {
        ParcelRecord::new(
            geometry,
            vec![
                ("OWNNAME".to_string(), AttrValue::Text(owner.to_string())),
                ("MAILADD".to_string(), AttrValue::Text(mail.to_string())),
                ("SITEADD".to_string(), AttrValue::Text(mail.to_string())),
                ("SCITY".to_string(), AttrValue::Text("Testville".into())),
                ("SZIP".to_string(), AttrValue::Text("00000".into())),
                ("STRUCTYEAR".to_string(), year),
                ("IMPROVVAL".to_string(), AttrValue::Number(100_000.0)),
                ("LANDVAL".to_string(), AttrValue::Number(40_000.0)),
            ],
        )
    }

    fn wgs84_dataset(records: Vec<ParcelRecord>) -> ParcelDataset {
        ParcelDataset {
            jurisdiction: "testville".to_string(),
            crs: Crs::WGS84,
            records,
        }
    }

    fn wgs84_boundary(zones: Vec<MultiPolygon<f64>>) -> StormBoundary {
        StormBoundary {
            zones,
            crs: Crs::WGS84,
        }
    }

    #[test]
    fn test_year_threshold_scenario() {
        // P1 (1980) survives, P2 (2005) is excluded by the cutoff.
        let ds = wgs84_dataset(vec![
            parcel(
                square_at(0.0, 0.0, 1.0),
                "Jane Doe",
                "12 Elm St",
                AttrValue::Number(1980.0),
            ),
            parcel(
                square_at(2.0, 0.0, 1.0),
                "Jane Doe",
                "14 Elm St",
                AttrValue::Number(2005.0),
            ),
        ]);
        let boundary = wgs84_boundary(vec![square_at(-1.0, -1.0, 6.0)]);

        let rows = run(boundary, &ds, &FilterConfig::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].owner, "Jane Doe");
        assert_eq!(rows[0].year_built, Some(1980));
        assert_eq!(rows[0].street_name, "Elm St");
    }

    #[test]
    fn test_corporate_owner_scenario() {
        let ds = wgs84_dataset(vec![parcel(
            square_at(0.0, 0.0, 1.0),
            "SMITH PROPERTIES LLC",
            "12 Elm St",
            AttrValue::Number(1980.0),
        )]);
        let boundary = wgs84_boundary(vec![square_at(-1.0, -1.0, 3.0)]);
        let rows = run(boundary, &ds, &FilterConfig::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_placeholder_mailing_scenario() {
        let ds = wgs84_dataset(vec![parcel(
            square_at(0.0, 0.0, 1.0),
            "Jane Doe",
            "0 MAIN ST",
            AttrValue::Number(1980.0),
        )]);
        let boundary = wgs84_boundary(vec![square_at(-1.0, -1.0, 3.0)]);
        let rows = run(boundary, &ds, &FilterConfig::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_numeric_string_year_equivalent() {
        let geometry = square_at(0.0, 0.0, 1.0);
        let boundary = || wgs84_boundary(vec![square_at(-1.0, -1.0, 3.0)]);

        let as_text = wgs84_dataset(vec![parcel(
            geometry.clone(),
            "Jane Doe",
            "12 Elm St",
            AttrValue::Text("1972".into()),
        )]);
        let as_number = wgs84_dataset(vec![parcel(
            geometry,
            "Jane Doe",
            "12 Elm St",
            AttrValue::Number(1972.0),
        )]);

        let text_rows = run(boundary(), &as_text, &FilterConfig::default()).unwrap();
        let number_rows = run(boundary(), &as_number, &FilterConfig::default()).unwrap();
        assert_eq!(text_rows, number_rows);
        assert_eq!(text_rows[0].year_built, Some(1972));
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let ds = wgs84_dataset(vec![
            parcel(
                square_at(0.0, 0.0, 1.0),
                "Jane Doe",
                "12 Elm St",
                AttrValue::Number(1980.0),
            ),
            parcel(
                square_at(1.5, 0.0, 1.0),
                "John Roe",
                "16 Elm St",
                AttrValue::Number(1960.0),
            ),
        ]);
        let boundary = || wgs84_boundary(vec![square_at(-1.0, -1.0, 6.0)]);

        let first = run(boundary(), &ds, &FilterConfig::default()).unwrap();
        let second = run(boundary(), &ds, &FilterConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cross_reference_matches_pre_aligned() {
        // Parcels in web mercator metres; boundary supplied in WGS84
        // must produce the same rows as the same boundary pre-aligned
        // to the dataset reference.
        let to_mercator = CrsTransform::new(Crs::WGS84, Crs::epsg(3857)).unwrap();
        let (cx, cy) = to_mercator.point(1.0, 1.0).unwrap();
        let ds = ParcelDataset {
            jurisdiction: "testville".to_string(),
            crs: Crs::epsg(3857),
            records: vec![parcel(
                square_at(cx - 50.0, cy - 50.0, 100.0),
                "Jane Doe",
                "12 Elm St",
                AttrValue::Number(1980.0),
            )],
        };

        let geographic = StormBoundary {
            zones: vec![square_at(0.9, 0.9, 0.2)],
            crs: Crs::WGS84,
        };
        let aligned = StormBoundary {
            zones: geographic
                .zones
                .iter()
                .map(|z| to_mercator.multi_polygon(z).unwrap())
                .collect(),
            crs: Crs::epsg(3857),
        };

        let cross = run(geographic, &ds, &FilterConfig::default()).unwrap();
        let pre = run(aligned, &ds, &FilterConfig::default()).unwrap();
        assert_eq!(cross.len(), 1);
        assert_eq!(cross, pre);
    }

    #[test]
    fn test_empty_result_is_ok_not_error() {
        let ds = wgs84_dataset(vec![parcel(
            square_at(50.0, 50.0, 1.0),
            "Jane Doe",
            "12 Elm St",
            AttrValue::Number(1980.0),
        )]);
        let boundary = wgs84_boundary(vec![square_at(0.0, 0.0, 1.0)]);
        let rows = run(boundary, &ds, &FilterConfig::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_variant_b_window() {
        let config = FilterConfig {
            cutoff_year: 2000,
            min_year: Some(0),
        };
        let ds = wgs84_dataset(vec![
            parcel(
                square_at(0.0, 0.0, 1.0),
                "Jane Doe",
                "12 Elm St",
                AttrValue::Number(1998.0),
            ),
            parcel(
                square_at(2.0, 0.0, 1.0),
                "John Roe",
                "14 Elm St",
                AttrValue::Number(0.0),
            ),
        ]);
        let boundary = wgs84_boundary(vec![square_at(-1.0, -1.0, 6.0)]);
        let rows = run(boundary, &ds, &config).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year_built, Some(1998));
    }
}
