//! The fixed external output schema and its CSV rendering.

use anyhow::Result;
use serde::Serialize;

use crate::derive::DerivedFields;
use crate::error::PipelineError;
use crate::models::parcel::{field, AttrValue, ParcelRecord};

/// Output column names, in emission order.
pub const OUTPUT_COLUMNS: [&str; 10] = [
    "owner",
    "address",
    "city",
    "zip",
    "yearBuilt",
    "improvValue",
    "landValue",
    "lat",
    "lon",
    "streetName",
];

/// One row of the field-operations table. One per eligible parcel; no
/// aggregation, no deduplication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub owner: String,
    pub address: String,
    pub city: String,
    pub zip: String,
    #[serde(rename = "yearBuilt")]
    pub year_built: Option<i32>,
    #[serde(rename = "improvValue")]
    pub improv_value: Option<f64>,
    #[serde(rename = "landValue")]
    pub land_value: Option<f64>,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "streetName")]
    pub street_name: String,
}

impl OutputRow {
    /// Project a surviving parcel into the external schema.
    ///
    /// A *missing column* is a dataset schema mismatch and fails the
    /// request; a null *value* in a present column renders empty.
    pub fn project(record: &ParcelRecord, derived: &DerivedFields) -> Result<Self, PipelineError> {
        Ok(Self {
            owner: required_text(record, field::OWNER)?,
            address: required_text(record, field::MAILING_ADDRESS)?,
            city: required_text(record, field::CITY)?,
            zip: required_text(record, field::ZIP)?,
            year_built: required_attr(record, field::STRUCTURE_YEAR)?
                .as_number()
                .map(|y| y.trunc() as i32),
            improv_value: required_attr(record, field::IMPROVEMENT_VALUE)?.as_number(),
            land_value: required_attr(record, field::LAND_VALUE)?.as_number(),
            lat: derived.lat,
            lon: derived.lon,
            street_name: derived.street_name.clone(),
        })
    }
}

fn required_attr<'a>(
    record: &'a ParcelRecord,
    name: &str,
) -> Result<&'a AttrValue, PipelineError> {
    record
        .attr(name)
        .ok_or_else(|| PipelineError::ProjectionFailed(format!("missing attribute '{name}'")))
}

fn required_text(record: &ParcelRecord, name: &str) -> Result<String, PipelineError> {
    let rendered = match required_attr(record, name)? {
        AttrValue::Text(s) => s.clone(),
        AttrValue::Number(n) => n.to_string(),
        AttrValue::Null => String::new(),
    };
    Ok(rendered)
}

/// Render rows as CSV with the fixed header, header-only when empty.
pub fn write_csv(rows: &[OutputRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(OUTPUT_COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}
