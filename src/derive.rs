//! Presentation fields computed for each eligible parcel.

use geo::{Centroid, Point};
use regex::Regex;

use crate::crs::{Crs, CrsTransform};
use crate::error::PipelineError;
use crate::models::parcel::field;
use crate::models::ParcelRecord;

/// Fields derived per parcel for the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub lat: f64,
    pub lon: f64,
    pub street_name: String,
}

/// Computes centroid coordinates and the normalized street name.
pub struct FieldDeriver {
    /// None when the dataset is already geographic WGS84.
    to_wgs84: Option<CrsTransform>,
    house_number: Regex,
}

impl FieldDeriver {
    pub fn new(dataset_crs: Crs) -> Result<Self, PipelineError> {
        let to_wgs84 = if dataset_crs == Crs::WGS84 {
            None
        } else {
            Some(CrsTransform::new(dataset_crs, Crs::WGS84)?)
        };
        Ok(Self {
            to_wgs84,
            house_number: Regex::new(r"^\d+\s+").unwrap(),
        })
    }

    pub fn derive(&self, record: &ParcelRecord) -> Result<DerivedFields, PipelineError> {
        let centroid = self.wgs84_centroid(record)?;

        // A null site address renders empty; a missing column is a
        // dataset schema mismatch.
        let site_address = record
            .attr(field::SITE_ADDRESS)
            .ok_or_else(|| {
                PipelineError::ProjectionFailed(format!(
                    "missing attribute '{}'",
                    field::SITE_ADDRESS
                ))
            })?
            .as_text()
            .unwrap_or("");

        Ok(DerivedFields {
            lat: centroid.y(),
            lon: centroid.x(),
            street_name: self.street_name(site_address),
        })
    }

    /// Geometric centroid in lon/lat. For concave parcels the centroid
    /// can fall outside the footprint; that is accepted, not corrected.
    fn wgs84_centroid(&self, record: &ParcelRecord) -> Result<Point<f64>, PipelineError> {
        let centroid = match &self.to_wgs84 {
            Some(transform) => transform.multi_polygon(&record.geometry)?.centroid(),
            None => record.geometry.centroid(),
        };
        centroid.ok_or_else(|| {
            PipelineError::ProjectionFailed("parcel centroid is undefined".to_string())
        })
    }

    /// Strip one leading house-number token (digits plus whitespace)
    /// from the site address; anything else passes through unchanged.
    pub fn street_name(&self, site_address: &str) -> String {
        self.house_number.replace(site_address, "").into_owned()
    }
}
