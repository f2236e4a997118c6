//! Stateless geometry on the WGS84 ellipsoid.
//!
//! Positions are Earth-centred Cartesian coordinates in metres (`DVec3`).
//! Distances are straight-line chords through that embedding, not geodesics.

use std::fmt;

use glam::DVec3;
use serde::Deserialize;

use crate::error::GeometryError;

pub const METERS_PER_MILE: f64 = 1609.344;
pub const FEET_PER_MILE: f64 = 5280.0;
pub const FEET_PER_METER: f64 = 3.28084;
pub const SQUARE_METERS_PER_ACRE: f64 = 4046.86;
pub const ACRES_PER_SQUARE_MILE: f64 = 640.0;

/// Metric or imperial presentation of measurements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn toggled(self) -> Self {
        match self {
            UnitSystem::Metric => UnitSystem::Imperial,
            UnitSystem::Imperial => UnitSystem::Metric,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnitSystem::Metric => "Metric",
            UnitSystem::Imperial => "Imperial",
        }
    }
}

/// Geodetic position: longitude/latitude in radians, height above the ellipsoid in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self { longitude, latitude, height }
    }

    pub fn from_degrees(lon: f64, lat: f64, height: f64) -> Self {
        Self::new(lon.to_radians(), lat.to_radians(), height)
    }

    pub fn lon_degrees(&self) -> f64 {
        self.longitude.to_degrees()
    }

    pub fn lat_degrees(&self) -> f64 {
        self.latitude.to_degrees()
    }

    /// Same horizontal position at a different height.
    pub fn with_height(self, height: f64) -> Self {
        Self { height, ..self }
    }
}

/// Reference ellipsoid described by its three radii.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    pub radii: DVec3,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        radii: DVec3::new(6_378_137.0, 6_378_137.0, 6_356_752.314_245_179),
    };

    fn first_eccentricity_squared(&self) -> f64 {
        let a = self.radii.x;
        let b = self.radii.z;
        1.0 - (b * b) / (a * a)
    }

    /// Geodetic surface normal at a longitude/latitude.
    pub fn geodetic_normal(&self, longitude: f64, latitude: f64) -> DVec3 {
        let (sin_lat, cos_lat) = latitude.sin_cos();
        let (sin_lon, cos_lon) = longitude.sin_cos();
        DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }

    pub fn cartographic_to_cartesian(&self, c: &Cartographic) -> DVec3 {
        let a = self.radii.x;
        let e2 = self.first_eccentricity_squared();
        let (sin_lat, cos_lat) = c.latitude.sin_cos();
        let (sin_lon, cos_lon) = c.longitude.sin_cos();
        // Prime vertical radius of curvature
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        DVec3::new(
            (n + c.height) * cos_lat * cos_lon,
            (n + c.height) * cos_lat * sin_lon,
            (n * (1.0 - e2) + c.height) * sin_lat,
        )
    }

    /// Inverse of [`Ellipsoid::cartographic_to_cartesian`] by fixed-point iteration on latitude.
    /// Returns `None` for points too close to the centre to have a defined geodetic position.
    pub fn cartesian_to_cartographic(&self, p: DVec3) -> Option<Cartographic> {
        let a = self.radii.x;
        let b = self.radii.z;
        if p.length() < 1.0e3 {
            return None;
        }

        let e2 = self.first_eccentricity_squared();
        let horizontal = (p.x * p.x + p.y * p.y).sqrt();
        let longitude = p.y.atan2(p.x);

        // On the polar axis latitude is ±90° and height is measured from the pole
        if horizontal < 1.0e-9 {
            let latitude = std::f64::consts::FRAC_PI_2.copysign(p.z);
            return Some(Cartographic::new(0.0, latitude, p.z.abs() - b));
        }

        let mut latitude = p.z.atan2(horizontal * (1.0 - e2));
        let mut height = 0.0;
        for _ in 0..8 {
            let sin_lat = latitude.sin();
            let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
            height = horizontal / latitude.cos() - n;
            let next = p.z.atan2(horizontal * (1.0 - e2 * n / (n + height)));
            let converged = (next - latitude).abs() < 1.0e-14;
            latitude = next;
            if converged {
                break;
            }
        }

        Some(Cartographic::new(longitude, latitude, height))
    }

    /// Project a point onto the ellipsoid surface along its geodetic normal.
    pub fn scale_to_geodetic_surface(&self, p: DVec3) -> Option<DVec3> {
        self.cartesian_to_cartographic(p)
            .map(|c| self.cartographic_to_cartesian(&c.with_height(0.0)))
    }
}

/// Straight-line distance between two Cartesian points.
#[inline]
pub fn distance(a: DVec3, b: DVec3) -> f64 {
    a.distance(b)
}

/// Sum of consecutive pairwise distances. Zero for fewer than two vertices.
pub fn cumulative_distance(vertices: &[DVec3]) -> f64 {
    vertices.windows(2).map(|w| distance(w[0], w[1])).sum()
}

#[inline]
pub fn midpoint(a: DVec3, b: DVec3) -> DVec3 {
    (a + b) * 0.5
}

#[inline]
pub fn lerp(a: DVec3, b: DVec3, t: f64) -> DVec3 {
    a + (b - a) * t
}

/// `count` evenly spaced points from `a` to `b`, both ends included.
pub fn sample_segment(a: DVec3, b: DVec3, count: usize) -> Vec<DVec3> {
    match count {
        0 => Vec::new(),
        1 => vec![a],
        _ => (0..count)
            .map(|i| lerp(a, b, i as f64 / (count - 1) as f64))
            .collect(),
    }
}

/// Area of the polygon obtained by dropping each vertex onto the ellipsoid surface.
///
/// Uses the vector area (Newell's method) of the surface-projected ring, which is
/// exact for planar rings and a close chord approximation for the small, nearly
/// planar rings drawn by hand on a globe. Vertex order only affects the sign,
/// which is discarded.
pub fn polygon_area(vertices: &[DVec3]) -> f64 {
    polygon_area_on(&Ellipsoid::WGS84, vertices)
}

pub fn polygon_area_on(ellipsoid: &Ellipsoid, vertices: &[DVec3]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }

    let surface: Vec<DVec3> = vertices
        .iter()
        .map(|&v| ellipsoid.scale_to_geodetic_surface(v).unwrap_or(v))
        .collect();

    // Translating to the first vertex keeps the cross products small
    let origin = surface[0];
    let mut normal = DVec3::ZERO;
    for i in 0..surface.len() {
        let a = surface[i] - origin;
        let b = surface[(i + 1) % surface.len()] - origin;
        normal += a.cross(b);
    }

    (normal.length() * 0.5).abs()
}

/// Arithmetic mean of the vertices.
///
/// This is not the area-weighted centroid of the polygon; it is only good enough
/// to anchor a label somewhere inside small convex-ish shapes.
pub fn centroid(vertices: &[DVec3]) -> DVec3 {
    if vertices.is_empty() {
        return DVec3::ZERO;
    }
    vertices.iter().copied().sum::<DVec3>() / vertices.len() as f64
}

/// Geographic rectangle in degrees, `west <= east`, `south <= north`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoExtent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoExtent {
    /// Validate a `[west, south, east, north]` bounding box.
    pub fn from_bbox(bbox: [f64; 4]) -> Result<Self, GeometryError> {
        let [west, south, east, north] = bbox;
        let reason = if bbox.iter().any(|v| !v.is_finite()) {
            Some("non-finite coordinate")
        } else if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            Some("longitude out of range")
        } else if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            Some("latitude out of range")
        } else if west > east {
            Some("west edge is east of east edge")
        } else if south > north {
            Some("south edge is north of north edge")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(GeometryError::InvalidExtent { bbox, reason }),
            None => Ok(Self { west, south, east, north }),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) * 0.5, (self.south + self.north) * 0.5)
    }

    /// Edge-inclusive overlap test.
    pub fn intersects(&self, other: &GeoExtent) -> bool {
        !(self.west > other.east
            || self.east < other.west
            || self.south > other.north
            || self.north < other.south)
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    /// Closed outline ring (lon, lat), counter-clockwise from the south-west corner.
    pub fn ring(&self) -> [(f64, f64); 5] {
        [
            (self.west, self.south),
            (self.east, self.south),
            (self.east, self.north),
            (self.west, self.north),
            (self.west, self.south),
        ]
    }
}

/// Display unit attached to a converted quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    Meters,
    Kilometers,
    Feet,
    Miles,
    SquareMeters,
    SquareKilometers,
    Acres,
    SquareMiles,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Unit::Meters => "m",
            Unit::Kilometers => "km",
            Unit::Feet => "ft",
            Unit::Miles => "mi",
            Unit::SquareMeters => "m²",
            Unit::SquareKilometers => "km²",
            Unit::Acres => "acres",
            Unit::SquareMiles => "sq mi",
        }
    }
}

/// A value in a display unit. Formats with two decimals, e.g. `"1.00 km"`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    /// Format with a caller-chosen precision.
    pub fn format(&self, decimals: usize) -> String {
        format!("{:.*} {}", decimals, self.value, self.unit.label())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit.label())
    }
}

/// Metres below 1000 m, kilometres from there; feet below one mile, miles from there.
pub fn convert_distance(meters: f64, units: UnitSystem) -> Quantity {
    match units {
        UnitSystem::Metric if meters >= 1000.0 => Quantity { value: meters / 1000.0, unit: Unit::Kilometers },
        UnitSystem::Metric => Quantity { value: meters, unit: Unit::Meters },
        UnitSystem::Imperial => {
            let miles = meters / METERS_PER_MILE;
            if miles >= 1.0 {
                Quantity { value: miles, unit: Unit::Miles }
            } else {
                Quantity { value: miles * FEET_PER_MILE, unit: Unit::Feet }
            }
        }
    }
}

/// Square metres below 1 km², square kilometres from there; acres below one
/// square mile (640 acres), square miles from there.
pub fn convert_area(square_meters: f64, units: UnitSystem) -> Quantity {
    match units {
        UnitSystem::Metric if square_meters >= 1.0e6 => Quantity {
            value: square_meters / 1.0e6,
            unit: Unit::SquareKilometers,
        },
        UnitSystem::Metric => Quantity { value: square_meters, unit: Unit::SquareMeters },
        UnitSystem::Imperial => {
            let acres = square_meters / SQUARE_METERS_PER_ACRE;
            if acres >= ACRES_PER_SQUARE_MILE {
                Quantity { value: acres / ACRES_PER_SQUARE_MILE, unit: Unit::SquareMiles }
            } else {
                Quantity { value: acres, unit: Unit::Acres }
            }
        }
    }
}

/// Heights never switch to km or miles.
pub fn convert_height(meters: f64, units: UnitSystem) -> Quantity {
    match units {
        UnitSystem::Metric => Quantity { value: meters, unit: Unit::Meters },
        UnitSystem::Imperial => Quantity { value: meters * FEET_PER_METER, unit: Unit::Feet },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(lon: f64, lat: f64) -> DVec3 {
        Ellipsoid::WGS84.cartographic_to_cartesian(&Cartographic::from_degrees(lon, lat, 0.0))
    }

    #[test]
    fn test_cartographic_round_trip() {
        let e = Ellipsoid::WGS84;
        for &(lon, lat, h) in &[(10.5, 45.5, 120.0), (-118.24, 34.05, 0.0), (0.0, -89.0, 3000.0)] {
            let c = Cartographic::from_degrees(lon, lat, h);
            let back = e.cartesian_to_cartographic(e.cartographic_to_cartesian(&c)).unwrap();
            assert!((back.lon_degrees() - lon).abs() < 1e-9);
            assert!((back.lat_degrees() - lat).abs() < 1e-9);
            assert!((back.height - h).abs() < 1e-4);
        }
    }

    #[test]
    fn test_pole_and_centre() {
        let e = Ellipsoid::WGS84;
        let pole = e.cartesian_to_cartographic(DVec3::new(0.0, 0.0, e.radii.z + 10.0)).unwrap();
        assert!((pole.lat_degrees() - 90.0).abs() < 1e-12);
        assert!((pole.height - 10.0).abs() < 1e-6);
        assert!(e.cartesian_to_cartographic(DVec3::ZERO).is_none());
    }

    #[test]
    fn test_cumulative_distance() {
        assert_eq!(cumulative_distance(&[]), 0.0);
        assert_eq!(cumulative_distance(&[DVec3::X]), 0.0);
        let pts = [DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0), DVec3::new(3.0, 4.0, 12.0)];
        assert!((cumulative_distance(&pts) - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_segment_endpoints() {
        let a = DVec3::new(0.0, 0.0, 0.0);
        let b = DVec3::new(10.0, 0.0, 0.0);
        let s = sample_segment(a, b, 11);
        assert_eq!(s.len(), 11);
        assert_eq!(s[0], a);
        assert_eq!(s[10], b);
        assert!((s[3].x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_polygon_area_square_km() {
        // ~1 km square near the equator
        let d = 1000.0 / 111_319.49;
        let ring = [surface(0.0, 0.0), surface(d, 0.0), surface(d, d), surface(0.0, d)];
        let area = polygon_area(&ring);
        assert!((area - 1.0e6).abs() / 1.0e6 < 0.01, "area {area}");
    }

    #[test]
    fn test_polygon_area_rotation_and_reversal() {
        let ring = vec![
            surface(10.0, 45.0),
            surface(10.05, 45.01),
            surface(10.07, 45.06),
            surface(10.01, 45.05),
            surface(9.98, 45.02),
        ];
        let base = polygon_area(&ring);
        for k in 0..ring.len() {
            let mut rotated = ring.clone();
            rotated.rotate_left(k);
            assert!((polygon_area(&rotated) - base).abs() < 1e-6 * base);
        }
        let mut reversed = ring.clone();
        reversed.reverse();
        assert!((polygon_area(&reversed) - base).abs() < 1e-6 * base);
    }

    #[test]
    fn test_polygon_area_degenerate() {
        assert_eq!(polygon_area(&[surface(0.0, 0.0), surface(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_centroid_is_mean() {
        let c = centroid(&[DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), DVec3::new(2.0, 2.0, 0.0)]);
        assert!((c - DVec3::new(4.0 / 3.0, 2.0 / 3.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_distance_conversion_boundaries() {
        assert_eq!(convert_distance(999.0, UnitSystem::Metric).to_string(), "999.00 m");
        assert_eq!(convert_distance(1000.0, UnitSystem::Metric).to_string(), "1.00 km");
        assert_eq!(convert_distance(METERS_PER_MILE, UnitSystem::Imperial).to_string(), "1.00 mi");
        let below = convert_distance(1609.0, UnitSystem::Imperial);
        assert_eq!(below.unit, Unit::Feet);
        assert!((below.value - 5278.87).abs() < 0.01);
    }

    #[test]
    fn test_area_conversion_boundaries() {
        assert_eq!(convert_area(999_999.0, UnitSystem::Metric).unit, Unit::SquareMeters);
        assert_eq!(convert_area(1.0e6, UnitSystem::Metric).to_string(), "1.00 km²");
        let sq_mile = SQUARE_METERS_PER_ACRE * ACRES_PER_SQUARE_MILE;
        assert_eq!(convert_area(sq_mile, UnitSystem::Imperial).to_string(), "1.00 sq mi");
        assert_eq!(convert_area(SQUARE_METERS_PER_ACRE, UnitSystem::Imperial).to_string(), "1.00 acres");
    }

    #[test]
    fn test_height_conversion() {
        assert_eq!(convert_height(100.0, UnitSystem::Imperial).format(1), "328.1 ft");
        assert_eq!(convert_height(12.5, UnitSystem::Metric).to_string(), "12.50 m");
    }

    #[test]
    fn test_extent_validation() {
        assert!(GeoExtent::from_bbox([10.5, 45.5, 12.5, 47.5]).is_ok());
        assert!(GeoExtent::from_bbox([12.5, 45.5, 10.5, 47.5]).is_err());
        assert!(GeoExtent::from_bbox([10.0, 95.0, 12.0, 96.0]).is_err());
        assert!(GeoExtent::from_bbox([f64::NAN, 0.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_extent_intersects_touching_edges() {
        let a = GeoExtent::from_bbox([0.0, 0.0, 1.0, 1.0]).unwrap();
        let b = GeoExtent::from_bbox([1.0, 1.0, 2.0, 2.0]).unwrap();
        let c = GeoExtent::from_bbox([1.5, 0.0, 2.0, 0.5]).unwrap();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.center(), (0.5, 0.5));
    }
}
