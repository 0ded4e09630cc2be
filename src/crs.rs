//! Coordinate reference handling.
//!
//! References are identified by EPSG code; equality of identifiers is
//! what the pipeline compares before spatial work. Transforms are pure
//! Rust via proj4rs, so no GDAL install is needed on field laptops.

use std::fmt;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use regex::Regex;

use crate::error::PipelineError;

/// A coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(u32);

impl Crs {
    /// Geographic longitude/latitude on WGS84, the output reference for
    /// centroid coordinates and the GeoJSON default.
    pub const WGS84: Crs = Crs(4326);

    pub fn epsg(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Parse a legacy GeoJSON `crs` name.
    ///
    /// Accepts `urn:ogc:def:crs:EPSG::2264`, `EPSG:2264`, and the OGC
    /// CRS84 urn (equivalent to WGS84 up to axis order, which GeoJSON
    /// fixes as lon/lat anyway).
    pub fn from_geojson_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84")
            || name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC::CRS84")
        {
            return Some(Self::WGS84);
        }
        let code = name.rsplit(&[':', '/'][..]).next()?;
        let prefixed_epsg = name.to_ascii_uppercase().contains("EPSG");
        if !prefixed_epsg {
            return None;
        }
        code.parse().ok().map(Self)
    }

    /// Extract the EPSG code from `.prj` WKT.
    ///
    /// The root authority of a WKT definition is the last
    /// `AUTHORITY["EPSG","n"]` (WKT1) or `ID["EPSG",n]` (WKT2) entry;
    /// earlier entries belong to nested datum/spheroid definitions.
    pub fn from_prj_wkt(wkt: &str) -> Option<Self> {
        let re = Regex::new(r#"(?i)(?:AUTHORITY|ID)\s*\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).unwrap();
        re.captures_iter(wkt)
            .last()
            .and_then(|caps| caps[1].parse().ok())
            .map(Self)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Reusable pointwise transform between two EPSG-coded references.
#[derive(Debug)]
pub struct CrsTransform {
    source: Proj,
    target: Proj,
    source_is_latlong: bool,
    target_is_latlong: bool,
}

impl CrsTransform {
    pub fn new(source: Crs, target: Crs) -> Result<Self, PipelineError> {
        let source_proj = projection_for(source)?;
        let target_proj = projection_for(target)?;
        let source_is_latlong = source_proj.is_latlong();
        let target_is_latlong = target_proj.is_latlong();
        Ok(Self {
            source: source_proj,
            target: target_proj,
            source_is_latlong,
            target_is_latlong,
        })
    }

    /// Transform a single coordinate pair.
    ///
    /// proj4rs works in radians for geographic references, so degrees
    /// are converted on the way in and out.
    pub fn point(&self, x: f64, y: f64) -> Result<(f64, f64), PipelineError> {
        let (in_x, in_y) = if self.source_is_latlong {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (in_x, in_y, 0.0);
        transform(&self.source, &self.target, &mut point)
            .map_err(|e| PipelineError::ReprojectionFailed(format!("transform failed: {e}")))?;

        let (out_x, out_y) = if self.target_is_latlong {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(PipelineError::ReprojectionFailed(format!(
                "coordinate ({x}, {y}) has no image in the target reference"
            )));
        }
        Ok((out_x, out_y))
    }

    /// Transform every coordinate of a multipolygon, preserving ring
    /// structure. Pointwise, so topology survives unsimplified.
    pub fn multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, PipelineError> {
        let polygons = mp
            .0
            .iter()
            .map(|polygon| self.polygon(polygon))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MultiPolygon::new(polygons))
    }

    fn polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>, PipelineError> {
        let exterior = self.line_string(polygon.exterior())?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.line_string(ring))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn line_string(&self, ring: &LineString<f64>) -> Result<LineString<f64>, PipelineError> {
        let coords = ring
            .coords()
            .map(|c| self.point(c.x, c.y).map(|(x, y)| Coord { x, y }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LineString::new(coords))
    }
}

fn projection_for(crs: Crs) -> Result<Proj, PipelineError> {
    let code: u16 = crs
        .code()
        .try_into()
        .map_err(|_| PipelineError::ReprojectionFailed(format!("unrecognized reference {crs}")))?;
    Proj::from_epsg_code(code)
        .map_err(|e| PipelineError::ReprojectionFailed(format!("unrecognized reference {crs}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_name_urn() {
        assert_eq!(
            Crs::from_geojson_name("urn:ogc:def:crs:EPSG::2264"),
            Some(Crs::epsg(2264))
        );
    }

    #[test]
    fn test_geojson_name_short() {
        assert_eq!(Crs::from_geojson_name("EPSG:3857"), Some(Crs::epsg(3857)));
    }

    #[test]
    fn test_geojson_name_crs84() {
        assert_eq!(
            Crs::from_geojson_name("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(Crs::WGS84)
        );
    }

    #[test]
    fn test_geojson_name_garbage() {
        assert_eq!(Crs::from_geojson_name("not a reference"), None);
    }

    #[test]
    fn test_prj_wkt_takes_root_authority() {
        // Nested datum authority (4269) must lose to the outer one.
        let wkt = r#"PROJCS["NAD83 / North Carolina (ftUS)",
            GEOGCS["NAD83",DATUM["North_American_Datum_1983",
            AUTHORITY["EPSG","6269"]],AUTHORITY["EPSG","4269"]],
            UNIT["US survey foot",0.304800609601219],
            AUTHORITY["EPSG","2264"]]"#;
        assert_eq!(Crs::from_prj_wkt(wkt), Some(Crs::epsg(2264)));
    }

    #[test]
    fn test_prj_wkt_without_authority() {
        assert_eq!(Crs::from_prj_wkt(r#"PROJCS["Local Grid"]"#), None);
    }

    #[test]
    fn test_point_wgs84_to_web_mercator() {
        let t = CrsTransform::new(Crs::WGS84, Crs::epsg(3857)).unwrap();
        let (x, y) = t.point(1.0, 0.0).unwrap();
        assert!((x - 111_319.490_793).abs() < 1e-3);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_point_round_trip() {
        let fwd = CrsTransform::new(Crs::WGS84, Crs::epsg(3857)).unwrap();
        let back = CrsTransform::new(Crs::epsg(3857), Crs::WGS84).unwrap();
        let (mx, my) = fwd.point(-78.64, 35.78).unwrap();
        let (lon, lat) = back.point(mx, my).unwrap();
        assert!((lon - -78.64).abs() < 1e-9);
        assert!((lat - 35.78).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_code_fails() {
        let err = CrsTransform::new(Crs::epsg(65_000), Crs::WGS84).unwrap_err();
        assert!(matches!(err, PipelineError::ReprojectionFailed(_)));
    }
}
