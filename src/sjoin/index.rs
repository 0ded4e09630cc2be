//! Spatial index over parcel footprints.

use geo::BoundingRect;
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use crate::models::ParcelDataset;

/// Wrapper for R-tree indexing of one parcel footprint.
#[derive(Clone)]
struct IndexedParcel {
    /// Position of the record in its dataset.
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedParcel {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over parcel bounding boxes, built once per loaded dataset.
///
/// Envelope queries prune the candidate set before exact intersection
/// testing.
pub struct ParcelSpatialIndex {
    tree: RTree<IndexedParcel>,
}

impl ParcelSpatialIndex {
    pub fn build(dataset: &ParcelDataset) -> Self {
        let indexed: Vec<IndexedParcel> = dataset
            .records
            .iter()
            .enumerate()
            .filter_map(|(position, record)| {
                record.geometry.bounding_rect().map(|rect| IndexedParcel {
                    position,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Spatial index built with {} entries", tree.size());
        Self { tree }
    }

    /// Dataset positions whose bounding box intersects the envelope.
    pub fn candidates<'a>(
        &'a self,
        envelope: &AABB<[f64; 2]>,
    ) -> impl Iterator<Item = usize> + 'a {
        self.tree
            .locate_in_envelope_intersecting(envelope)
            .map(|indexed| indexed.position)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
