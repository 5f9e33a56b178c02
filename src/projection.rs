//! Bidirectional transform between geographic (lon, lat) coordinates and a
//! planar CRS suitable for area and distance computation (C1).

use geo::{Coord, MultiPolygon, Point, Polygon};
use proj4rs::{proj::Proj, transform::transform};

use crate::error::{EngineError, Result};

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// A forward/inverse transform pair between WGS84 and a single UTM zone
/// chosen to minimise distortion over the corpus being projected.
///
/// The zone is picked once, from the centroid of the data the caller is
/// about to project, and reused for every point in that computation - there
/// is no per-point re-selection.
pub struct Projection {
    wgs84: Proj,
    utm: Proj,
}

impl Projection {
    /// Builds a projection whose UTM zone is centred on `(center_lng, center_lat)`.
    pub fn for_center(center_lng: f64, center_lat: f64) -> Result<Self> {
        let zone = (((center_lng + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60);
        let north = center_lat >= 0.0;
        let south = if north { "" } else { " +south" };
        let utm_proj4 = format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs");

        let utm = Proj::from_proj_string(&utm_proj4)
            .map_err(|e| EngineError::Internal(format!("failed to build UTM projection: {e}")))?;
        let wgs84 = Proj::from_proj_string(WGS84_PROJ4)
            .map_err(|e| EngineError::Internal(format!("failed to build WGS84 projection: {e}")))?;
        Ok(Self { wgs84, utm })
    }

    /// Builds a projection centred on the mean of `points` (lng, lat order).
    pub fn for_points<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Result<Self> {
        let mut sum_lng = 0.0;
        let mut sum_lat = 0.0;
        let mut n = 0usize;
        for &(lng, lat) in points {
            sum_lng += lng;
            sum_lat += lat;
            n += 1;
        }
        if n == 0 {
            return Err(EngineError::InvalidInput("no points to centre a projection on".into()));
        }
        Self::for_center(sum_lng / n as f64, sum_lat / n as f64)
    }

    /// Projects a single geographic point (lng, lat) to planar metres (x, y).
    pub fn project(&self, lng: f64, lat: f64) -> Result<(f64, f64)> {
        let mut point_3d = (lng.to_radians(), lat.to_radians(), 0.0);
        transform(&self.wgs84, &self.utm, &mut point_3d)
            .map_err(|e| EngineError::Internal(format!("forward transform failed: {e}")))?;
        Ok((point_3d.0, point_3d.1))
    }

    /// Inverse of [`project`](Self::project): planar metres back to (lng, lat).
    pub fn unproject(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point_3d = (x, y, 0.0);
        transform(&self.utm, &self.wgs84, &mut point_3d)
            .map_err(|e| EngineError::Internal(format!("inverse transform failed: {e}")))?;
        Ok((point_3d.0.to_degrees(), point_3d.1.to_degrees()))
    }

    /// Projects every point in `points` (lng, lat), preserving order.
    pub fn project_all(&self, points: &[(f64, f64)]) -> Result<Vec<(f64, f64)>> {
        points.iter().map(|&(lng, lat)| self.project(lng, lat)).collect()
    }

    pub fn project_point(&self, p: Point<f64>) -> Result<Point<f64>> {
        let (x, y) = self.project(p.x(), p.y())?;
        Ok(Point::new(x, y))
    }

    pub fn unproject_point(&self, p: Point<f64>) -> Result<Point<f64>> {
        let (lng, lat) = self.unproject(p.x(), p.y())?;
        Ok(Point::new(lng, lat))
    }

    /// Projects a polygon's rings from geographic to planar coordinates.
    pub fn project_polygon(&self, poly: &Polygon<f64>) -> Result<Polygon<f64>> {
        self.map_polygon(poly, |lng, lat| self.project(lng, lat))
    }

    /// Inverse of [`project_polygon`](Self::project_polygon).
    pub fn unproject_polygon(&self, poly: &Polygon<f64>) -> Result<Polygon<f64>> {
        self.map_polygon(poly, |x, y| self.unproject(x, y))
    }

    pub fn project_multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        let polys = mp.0.iter().map(|p| self.project_polygon(p)).collect::<Result<Vec<_>>>()?;
        Ok(MultiPolygon(polys))
    }

    pub fn unproject_multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        let polys = mp.0.iter().map(|p| self.unproject_polygon(p)).collect::<Result<Vec<_>>>()?;
        Ok(MultiPolygon(polys))
    }

    fn map_polygon(&self, poly: &Polygon<f64>, f: impl Fn(f64, f64) -> Result<(f64, f64)>) -> Result<Polygon<f64>> {
        let map_ring = |ring: &geo::LineString<f64>| -> Result<geo::LineString<f64>> {
            let coords = ring
                .coords()
                .map(|c| f(c.x, c.y).map(|(x, y)| Coord { x, y }))
                .collect::<Result<Vec<_>>>()?;
            Ok(geo::LineString(coords))
        };
        let exterior = map_ring(poly.exterior())?;
        let interiors = poly.interiors().iter().map(map_ring).collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_tolerance() {
        let proj = Projection::for_center(77.2, 28.6).unwrap();
        let points = [(77.2, 28.6), (72.8, 19.1), (80.3, 13.1)];
        for &(lng, lat) in &points {
            let (x, y) = proj.project(lng, lat).unwrap();
            let (lng2, lat2) = proj.unproject(x, y).unwrap();
            assert!((lng - lng2).abs() < 1e-6, "lng round-trip: {lng} vs {lng2}");
            assert!((lat - lat2).abs() < 1e-6, "lat round-trip: {lat} vs {lat2}");
        }
    }

    #[test]
    fn zone_selection_is_clamped() {
        let proj = Projection::for_center(179.9, 85.0);
        assert!(proj.is_ok());
        let proj = Projection::for_center(-179.9, -85.0);
        assert!(proj.is_ok());
    }

    #[test]
    fn southern_hemisphere_round_trip() {
        let proj = Projection::for_center(151.2, -33.9).unwrap();
        let (x, y) = proj.project(151.2, -33.9).unwrap();
        let (lng, lat) = proj.unproject(x, y).unwrap();
        assert!((lng - 151.2).abs() < 1e-6);
        assert!((lat - (-33.9)).abs() < 1e-6);
    }
}
