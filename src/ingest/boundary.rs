//! Storm boundary ingestion from GeoJSON.

use std::fs;
use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{GeoJson, Geometry, PolygonType, Value};
use tracing::debug;

use crate::crs::Crs;
use crate::error::PipelineError;

/// The storm-impact boundary: one or more polygonal zones sharing one
/// coordinate reference. Immutable once loaded; a parcel matches when
/// it intersects any zone.
#[derive(Debug, Clone)]
pub struct StormBoundary {
    pub zones: Vec<MultiPolygon<f64>>,
    pub crs: Crs,
}

impl StormBoundary {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let bytes = fs::read(path).map_err(|e| {
            PipelineError::InvalidBoundaryGeometry(format!("read {}: {e}", path.display()))
        })?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PipelineError> {
        let geojson = GeoJson::from_reader(bytes)
            .map_err(|e| PipelineError::InvalidBoundaryGeometry(e.to_string()))?;

        let crs = declared_crs(&geojson)?;

        let geometries = match geojson {
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
            GeoJson::Feature(f) => f.geometry.map(|g| vec![g]).unwrap_or_default(),
            GeoJson::Geometry(g) => vec![g],
        };

        let zones = polygonal_zones(geometries)?;
        if zones.is_empty() {
            return Err(PipelineError::InvalidBoundaryGeometry(
                "document contains no polygonal geometry".to_string(),
            ));
        }

        debug!("Loaded storm boundary: {} zones ({})", zones.len(), crs);
        Ok(Self { zones, crs })
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }
}

/// Read the legacy top-level `crs` member if present; RFC 7946 default
/// is WGS84. A `crs` member that names an unrecognizable reference
/// fails the boundary rather than silently defaulting.
fn declared_crs(geojson: &GeoJson) -> Result<Crs, PipelineError> {
    let members = match geojson {
        GeoJson::FeatureCollection(fc) => &fc.foreign_members,
        GeoJson::Feature(f) => &f.foreign_members,
        GeoJson::Geometry(g) => &g.foreign_members,
    };

    let Some(crs) = members.as_ref().and_then(|m| m.get("crs")) else {
        return Ok(Crs::WGS84);
    };

    crs_name(crs)
        .and_then(Crs::from_geojson_name)
        .ok_or_else(|| {
            PipelineError::InvalidBoundaryGeometry(
                "unrecognized coordinate reference in crs member".to_string(),
            )
        })
}

fn crs_name(member: &serde_json::Value) -> Option<&str> {
    member.get("properties")?.get("name")?.as_str()
}

/// Collect every polygonal value, one zone per Polygon/MultiPolygon,
/// descending into geometry collections.
fn polygonal_zones(geometries: Vec<Geometry>) -> Result<Vec<MultiPolygon<f64>>, PipelineError> {
    let mut zones = Vec::new();
    for geometry in geometries {
        match geometry.value {
            Value::Polygon(rings) => {
                zones.push(MultiPolygon::new(vec![polygon_from_rings(rings)?]));
            }
            Value::MultiPolygon(polygons) => {
                let polygons = polygons
                    .into_iter()
                    .map(polygon_from_rings)
                    .collect::<Result<Vec<_>, _>>()?;
                zones.push(MultiPolygon::new(polygons));
            }
            Value::GeometryCollection(inner) => {
                zones.extend(polygonal_zones(inner)?);
            }
            _ => {}
        }
    }
    Ok(zones)
}

fn polygon_from_rings(mut rings: PolygonType) -> Result<Polygon<f64>, PipelineError> {
    if rings.is_empty() {
        return Err(PipelineError::InvalidBoundaryGeometry(
            "polygon has no rings".to_string(),
        ));
    }
    let exterior = ring(rings.remove(0))?;
    let interiors = rings.into_iter().map(ring).collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring(positions: Vec<Vec<f64>>) -> Result<LineString<f64>, PipelineError> {
    let coords = positions
        .into_iter()
        .map(|p| {
            if p.len() < 2 {
                return Err(PipelineError::InvalidBoundaryGeometry(
                    "ring position with fewer than two ordinates".to_string(),
                ));
            }
            Ok(Coord { x: p[0], y: p[1] })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ring = LineString::new(coords);
    if ring.0.len() < 4 {
        return Err(PipelineError::InvalidBoundaryGeometry(
            "ring has fewer than four positions".to_string(),
        ));
    }
    if !ring.is_closed() {
        return Err(PipelineError::InvalidBoundaryGeometry(
            "ring is not closed".to_string(),
        ));
    }
    Ok(ring)
}
