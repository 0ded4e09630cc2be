//! Coordinate reference reconciliation before the spatial join.

use tracing::info;

use crate::crs::{Crs, CrsTransform};
use crate::error::PipelineError;
use crate::ingest::StormBoundary;

/// Express the boundary in the parcel dataset's reference.
///
/// Identical identifiers are a no-op. Otherwise the *boundary* is the
/// side transformed: the parcel dataset is typically orders of
/// magnitude larger, and its stored coordinates stay authoritative.
pub fn reconcile(boundary: StormBoundary, target: Crs) -> Result<StormBoundary, PipelineError> {
    if boundary.crs == target {
        return Ok(boundary);
    }

    info!("Reprojecting storm boundary {} -> {}", boundary.crs, target);
    let transform = CrsTransform::new(boundary.crs, target)?;
    let zones = boundary
        .zones
        .iter()
        .map(|zone| transform.multi_polygon(zone))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StormBoundary {
        zones,
        crs: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn unit_square() -> StormBoundary {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        StormBoundary {
            zones: vec![MultiPolygon::new(vec![square])],
            crs: Crs::WGS84,
        }
    }

    #[test]
    fn test_same_reference_is_identity() {
        let boundary = unit_square();
        let reconciled = reconcile(boundary.clone(), Crs::WGS84).unwrap();
        assert_eq!(reconciled.crs, Crs::WGS84);
        assert_eq!(reconciled.zones, boundary.zones);
    }

    #[test]
    fn test_cross_reference_transforms_coordinates() {
        let reconciled = reconcile(unit_square(), Crs::epsg(3857)).unwrap();
        assert_eq!(reconciled.crs, Crs::epsg(3857));
        let coords: Vec<_> = reconciled.zones[0].0[0].exterior().coords().collect();
        // (1°, 0°) lands near x = 111319.49 m on the mercator plane.
        assert!((coords[1].x - 111_319.490_793).abs() < 1e-3);
        assert!(coords[1].y.abs() < 1e-6);
    }

    #[test]
    fn test_unknown_reference_fails() {
        let mut boundary = unit_square();
        boundary.crs = Crs::epsg(64_999);
        let err = reconcile(boundary, Crs::epsg(3857)).unwrap_err();
        assert!(matches!(err, PipelineError::ReprojectionFailed(_)));
    }
}
