//! Static ASTER calibration constants.
//!
//! Gain coefficients are per-scene and live in [`SceneMetadata`](crate::types::SceneMetadata);
//! only the sensor-fixed tables are kept here.

use crate::types::Band;

/// Earth-Sun distance model: d = 1 - ECCENTRICITY * cos(ORBIT_RATE * (doy - PERIHELION_DOY))
pub const EARTH_SUN_ECCENTRICITY: f64 = 0.01672;
pub const EARTH_SUN_ORBIT_RATE: f64 = 0.01720209895;
pub const EARTH_SUN_PERIHELION_DOY: f64 = 4.0;

/// Calibration offset subtracted from DN before applying the gain
pub const DN_OFFSET: f64 = 1.0;

/// Planck constants for radiance to brightness temperature conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalConstants {
    pub k1: f64,
    pub k2: f64,
}

/// Mean exo-atmospheric solar irradiance (W m-2 um-1) for VIS/SWIR bands
pub fn solar_irradiance(band: Band) -> Option<f64> {
    match band {
        Band::B01 => Some(1845.99),
        Band::B02 => Some(1555.74),
        Band::B3N => Some(1119.47),
        Band::B04 => Some(231.25),
        Band::B05 => Some(79.81),
        Band::B06 => Some(74.99),
        Band::B07 => Some(68.66),
        Band::B08 => Some(59.74),
        Band::B09 => Some(56.92),
        _ => None,
    }
}

/// K1/K2 constants for TIR bands
pub fn thermal_constants(band: Band) -> Option<ThermalConstants> {
    let (k1, k2) = match band {
        Band::B10 => (3040.136402, 1735.337945),
        Band::B11 => (2482.375199, 1666.398761),
        Band::B12 => (1935.060183, 1585.420044),
        Band::B13 => (866.468575, 1350.069147),
        Band::B14 => (641.326517, 1271.221673),
        _ => return None,
    };
    Some(ThermalConstants { k1, k2 })
}
