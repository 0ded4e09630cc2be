//! Error taxonomy for the impact-filter pipeline.
//!
//! Every variant is terminal for the request: the pipeline either
//! returns a complete row sequence or exactly one of these. Attribute
//! coercion failures inside the eligibility rules are *not* errors,
//! they resolve to exclusion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The uploaded boundary document could not be parsed as polygonal
    /// geometry.
    #[error("invalid storm boundary: {0}")]
    InvalidBoundaryGeometry(String),

    /// No parcel dataset exists for the requested jurisdiction key.
    #[error("no parcel dataset for jurisdiction '{0}'")]
    JurisdictionNotFound(String),

    /// A dataset was located but could not be read into parcel records.
    #[error("invalid parcel dataset: {0}")]
    InvalidParcelDataset(String),

    /// A coordinate reference was unrecognized or the transform is
    /// undefined for the geometry's coordinate domain.
    #[error("reprojection failed: {0}")]
    ReprojectionFailed(String),

    /// The intersection test could not be evaluated (malformed
    /// geometry). The whole request fails; no partial results.
    #[error("spatial join failed: {0}")]
    SpatialJoinFailed(String),

    /// A required source attribute was absent when building the output
    /// schema. Signals a dataset schema mismatch.
    #[error("output projection failed: {0}")]
    ProjectionFailed(String),
}
