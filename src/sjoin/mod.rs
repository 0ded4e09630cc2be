//! Spatial join of parcels against the storm boundary.
//!
//! An R-tree over parcel bounding boxes prunes candidates; exact
//! intersection tests decide membership.

mod index;
mod matcher;

pub use index::ParcelSpatialIndex;
pub use matcher::intersecting_parcels;
