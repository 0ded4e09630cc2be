//! Palmetto - storm-impact parcel analysis
//!
//! This library provides the geospatial impact filter pipeline shared
//! by the serve and analyze binaries: boundary/dataset ingestion,
//! coordinate reference reconciliation, spatial matching, eligibility
//! filtering, and output projection.

pub mod config;
pub mod crs;
pub mod derive;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod reproject;
pub mod sjoin;

pub use error::PipelineError;
pub use ingest::StormBoundary;
pub use models::{OutputRow, ParcelDataset, ParcelRecord};
