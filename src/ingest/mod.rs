//! Geometry ingestion: the storm boundary document and the
//! per-jurisdiction parcel dataset.

pub mod boundary;
pub mod dataset;

pub use boundary::StormBoundary;
