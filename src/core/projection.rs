//! UTM projection support.
//!
//! Areas, pixel footprints and clipping are evaluated in the UTM zone of the
//! area of interest. Zone selection follows the standard grid including the
//! Norway (32V) and Svalbard (31X/33X/35X/37X) exceptions, and coordinates are
//! converted with the Krüger series expansion of the WGS84 transverse Mercator.

use crate::types::{AsterError, AsterResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central scale factor
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Coordinate reference systems understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// WGS84 longitude/latitude (EPSG:4326)
    Geographic,
    /// WGS84 / UTM (EPSG:326zz north, 327zz south)
    Utm { zone: u8, north: bool },
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Geographic => 4326,
            Crs::Utm { zone, north: true } => 32600 + *zone as u32,
            Crs::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }

    pub fn from_epsg(code: u32) -> AsterResult<Self> {
        match code {
            4326 => Ok(Crs::Geographic),
            32601..=32660 => Ok(Crs::Utm { zone: (code - 32600) as u8, north: true }),
            32701..=32760 => Ok(Crs::Utm { zone: (code - 32700) as u8, north: false }),
            _ => Err(AsterError::Projection(format!("Unsupported CRS EPSG:{}", code))),
        }
    }

    /// UTM projection appropriate for a location
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        Crs::Utm {
            zone: utm_zone(lat, lon),
            north: lat >= 0.0,
        }
    }

    /// `EPSG:<code>` string
    pub fn authority_code(&self) -> String {
        format!("EPSG:{}", self.epsg())
    }

    pub fn to_lon_lat(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Crs::Geographic => (x, y),
            Crs::Utm { zone, north } => TransverseMercator::utm(*zone, *north).inverse(x, y),
        }
    }

    pub fn from_lon_lat(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Crs::Geographic => (lon, lat),
            Crs::Utm { zone, north } => TransverseMercator::utm(*zone, *north).forward(lon, lat),
        }
    }

    /// Re-express a point given in `self` in the `target` CRS
    pub fn transform_to(&self, target: &Crs, x: f64, y: f64) -> (f64, f64) {
        if self == target {
            return (x, y);
        }
        let (lon, lat) = self.to_lon_lat(x, y);
        target.from_lon_lat(lon, lat)
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority_code())
    }
}

/// UTM zone number for a latitude/longitude pair
pub fn utm_zone(lat: f64, lon: f64) -> u8 {
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..=84.0).contains(&lat) && lon >= 0.0 {
        if lon < 9.0 {
            return 31;
        } else if lon < 21.0 {
            return 33;
        } else if lon < 33.0 {
            return 35;
        } else if lon < 42.0 {
            return 37;
        }
    }
    let zone = ((lon + 180.0) / 6.0).floor() + 1.0;
    zone.clamp(1.0, 60.0) as u8
}

/// EPSG code of the UTM projection for a latitude/longitude pair
pub fn utm_epsg(lat: f64, lon: f64) -> u32 {
    Crs::utm_for(lon, lat).epsg()
}

/// WGS84 transverse Mercator (Krüger series, third order in n)
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian in radians
    lon0: f64,
    k0: f64,
    false_easting: f64,
    false_northing: f64,
    /// Rectifying radius
    a_rect: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl TransverseMercator {
    pub fn new(central_meridian_deg: f64, k0: f64, false_easting: f64, false_northing: f64) -> Self {
        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;

        let a_rect = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
            n2 / 48.0 + n3 / 15.0,
            17.0 * n3 / 480.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
            56.0 * n3 / 15.0,
        ];

        Self {
            lon0: central_meridian_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            a_rect,
            alpha,
            beta,
            delta,
        }
    }

    /// Projection for a UTM zone
    pub fn utm(zone: u8, north: bool) -> Self {
        let central_meridian = zone as f64 * 6.0 - 183.0;
        let false_northing = if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH };
        Self::new(central_meridian, UTM_K0, UTM_FALSE_EASTING, false_northing)
    }

    /// (lon, lat) in degrees to (easting, northing) in meters
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let n = WGS84_F / (2.0 - WGS84_F);
        let phi = lat.to_radians();
        let dlon = normalize_angle(lon.to_radians() - self.lon0);

        let c = 2.0 * n.sqrt() / (1.0 + n);
        let t = (phi.sin().atanh() - c * (c * phi.sin()).atanh()).sinh();
        let xi_p = t.atan2(dlon.cos());
        let eta_p = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let easting = self.false_easting + self.k0 * self.a_rect * eta;
        let northing = self.false_northing + self.k0 * self.a_rect * xi;
        (easting, northing)
    }

    /// (easting, northing) in meters to (lon, lat) in degrees
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let xi = (northing - self.false_northing) / (self.k0 * self.a_rect);
        let eta = (easting - self.false_easting) / (self.k0 * self.a_rect);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += d * (k * chi).sin();
        }
        let lon = self.lon0 + eta_p.sinh().atan2(xi_p.cos());

        (normalize_angle(lon).to_degrees(), phi.to_degrees())
    }
}

/// Wrap an angle to (-PI, PI]
fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}
