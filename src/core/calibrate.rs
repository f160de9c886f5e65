use crate::core::coefficients::{
    self, ThermalConstants, DN_OFFSET, EARTH_SUN_ECCENTRICITY, EARTH_SUN_ORBIT_RATE,
    EARTH_SUN_PERIHELION_DOY,
};
use crate::types::{Advisory, AsterError, AsterResult, Band, BandSet, MaskedBand, Scene, Units};
use ndarray::Zip;

/// Earth-Sun distance in astronomical units for a zero-based day of year
pub fn earth_sun_distance(day_of_year: u32) -> f64 {
    1.0 - EARTH_SUN_ECCENTRICITY
        * (EARTH_SUN_ORBIT_RATE * (day_of_year as f64 - EARTH_SUN_PERIHELION_DOY)).cos()
}

/// Solar zenith angle in radians from solar elevation in degrees
pub fn solar_zenith(solar_elevation_deg: f64) -> f64 {
    (90.0 - solar_elevation_deg).to_radians()
}

/// Scale factor turning radiance into reflectance once divided by band irradiance:
/// `pi * d^2 / cos(zenith)`
pub fn reflectance_factor(day_of_year: u32, solar_elevation_deg: f64) -> f64 {
    let d = earth_sun_distance(day_of_year);
    std::f64::consts::PI * d * d / solar_zenith(solar_elevation_deg).cos()
}

/// At-sensor radiance from a digital number
pub fn dn_to_radiance(dn: f64, gain: f64) -> f64 {
    (dn - DN_OFFSET) * gain
}

/// Brightness temperature (K) from TIR radiance; NaN for non-positive radiance
pub fn brightness_temperature(radiance: f64, constants: ThermalConstants) -> f64 {
    if radiance <= 0.0 {
        return f64::NAN;
    }
    constants.k2 / (constants.k1 / radiance + 1.0).ln()
}

/// Rewrite valid pixels of a band in place; non-finite results invalidate the pixel
fn map_valid<F>(band: &mut MaskedBand, units: Units, f: F)
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    let apply = |value: &mut f32, valid: &mut bool| {
        if *valid {
            let out = f(*value as f64);
            if out.is_finite() {
                *value = out as f32;
            } else {
                *value = f32::NAN;
                *valid = false;
            }
        }
    };

    #[cfg(feature = "parallel")]
    Zip::from(&mut band.values).and(&mut band.valid).par_for_each(apply);
    #[cfg(not(feature = "parallel"))]
    Zip::from(&mut band.values).and(&mut band.valid).for_each(apply);

    band.units = units;
}

/// DN to TOA reflectance / brightness temperature converter
///
/// The band subset restricts the reflectance and temperature stages; radiance
/// conversion always covers every band physically present in the scene.
#[derive(Debug, Clone)]
pub struct RadiometricConverter {
    bands: BandSet,
}

impl RadiometricConverter {
    pub fn new(bands: BandSet) -> Self {
        Self { bands }
    }

    /// Converter targeting all fourteen bands
    pub fn all_bands() -> Self {
        Self::new(Band::ALL.into_iter().collect())
    }

    pub fn bands(&self) -> &BandSet {
        &self.bands
    }

    /// DN -> radiance for every present band still in DN units
    pub fn to_radiance(&self, mut scene: Scene) -> AsterResult<Scene> {
        let targets = scene.bands_in_units(Units::Dn);
        log::debug!("Scene {}: DN -> radiance for {}", scene.id(), targets);

        for band in targets.iter() {
            let gain = scene.metadata.gain_coefficient(band)?;
            if let Some(data) = scene.bands.get_mut(&band) {
                map_valid(data, Units::Radiance, |dn| dn_to_radiance(dn, gain));
            }
        }
        Ok(scene)
    }

    /// Radiance -> TOA reflectance for requested VIS/SWIR bands
    pub fn to_reflectance(&self, mut scene: Scene) -> AsterResult<Scene> {
        let targets = self
            .bands
            .intersection(&BandSet::vis_swir())
            .intersection(&scene.bands_in_units(Units::Radiance));
        if targets.is_empty() {
            log::debug!("Scene {}: no VIS/SWIR bands to convert", scene.id());
            return Ok(scene);
        }

        let elevation = scene.metadata.solar_elevation;
        if elevation <= 0.0 || elevation > 90.0 {
            return Err(AsterError::Processing(format!(
                "Scene {}: solar elevation {:.2} deg does not allow reflectance",
                scene.id(),
                elevation
            )));
        }
        let factor = reflectance_factor(scene.metadata.day_of_year(), elevation);
        log::debug!(
            "Scene {}: radiance -> reflectance for {} (factor {:.6})",
            scene.id(),
            targets,
            factor
        );

        for band in targets.iter() {
            let irradiance = coefficients::solar_irradiance(band).ok_or_else(|| {
                AsterError::Processing(format!("No solar irradiance for band {}", band))
            })?;
            if let Some(data) = scene.bands.get_mut(&band) {
                map_valid(data, Units::Reflectance, |radiance| radiance * factor / irradiance);
            }
        }
        Ok(scene)
    }

    /// Radiance -> brightness temperature for requested TIR bands
    pub fn to_brightness_temperature(&self, mut scene: Scene) -> AsterResult<Scene> {
        let targets = self
            .bands
            .intersection(&BandSet::tir())
            .intersection(&scene.bands_in_units(Units::Radiance));
        if targets.is_empty() {
            log::debug!("Scene {}: no TIR bands to convert", scene.id());
            return Ok(scene);
        }
        log::debug!("Scene {}: radiance -> brightness temperature for {}", scene.id(), targets);

        for band in targets.iter() {
            let constants = coefficients::thermal_constants(band).ok_or_else(|| {
                AsterError::Processing(format!("No thermal constants for band {}", band))
            })?;
            if let Some(data) = scene.bands.get_mut(&band) {
                map_valid(data, Units::BrightnessTemperature, |radiance| {
                    brightness_temperature(radiance, constants)
                });
            }
        }
        Ok(scene)
    }

    /// Full DN -> TOA conversion: radiance, then reflectance, then brightness temperature
    ///
    /// Returns the scene unmodified, with a [`Advisory::NoValidBands`], when none of
    /// the requested bands is present.
    pub fn dn_to_toa(&self, mut scene: Scene) -> AsterResult<Scene> {
        let convertible = self.bands.intersection(&scene.present_bands());
        if convertible.is_empty() {
            let scene_id = scene.id().to_string();
            scene.advise(Advisory::NoValidBands { scene_id });
            return Ok(scene);
        }

        log::info!("Converting scene {} to TOA ({} requested bands)", scene.id(), convertible.len());
        let scene = self.to_radiance(scene)?;
        let scene = self.to_reflectance(scene)?;
        self.to_brightness_temperature(scene)
    }
}
