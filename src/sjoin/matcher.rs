//! Intersects join between a parcel dataset and the storm boundary.

use std::collections::BTreeSet;

use geo::{BoundingRect, CoordsIter, Intersects, MultiPolygon};
use rstar::AABB;
use tracing::info;

use crate::error::PipelineError;
use crate::ingest::StormBoundary;
use crate::models::ParcelDataset;
use crate::sjoin::ParcelSpatialIndex;

/// Positions of the parcels intersecting any boundary zone, in dataset
/// order.
///
/// The predicate is `intersects` (point sets are not disjoint), so
/// boundary-only contact counts. Strict containment is deliberately
/// not required.
pub fn intersecting_parcels(
    dataset: &ParcelDataset,
    boundary: &StormBoundary,
    index: &ParcelSpatialIndex,
) -> Result<Vec<usize>, PipelineError> {
    // CRS equality is enforced here, not assumed.
    if boundary.crs != dataset.crs {
        return Err(PipelineError::SpatialJoinFailed(format!(
            "coordinate references differ ({} vs {})",
            boundary.crs, dataset.crs
        )));
    }

    for (zone_idx, zone) in boundary.zones.iter().enumerate() {
        if !finite(zone) {
            return Err(PipelineError::SpatialJoinFailed(format!(
                "storm zone {zone_idx} has non-finite coordinates"
            )));
        }
    }
    for (position, record) in dataset.records.iter().enumerate() {
        if !finite(&record.geometry) {
            return Err(PipelineError::SpatialJoinFailed(format!(
                "parcel {position} has non-finite coordinates"
            )));
        }
    }

    let mut matched: BTreeSet<usize> = BTreeSet::new();
    for zone in &boundary.zones {
        let Some(rect) = zone.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        for position in index.candidates(&envelope) {
            if matched.contains(&position) {
                continue;
            }
            if zone.intersects(&dataset.records[position].geometry) {
                matched.insert(position);
            }
        }
    }

    info!(
        "Parcels intersected: {} of {}",
        matched.len(),
        dataset.len()
    );
    // Ascending positions == original dataset order.
    Ok(matched.into_iter().collect())
}

fn finite(mp: &MultiPolygon<f64>) -> bool {
    mp.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}
