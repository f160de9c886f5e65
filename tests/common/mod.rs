#![allow(dead_code)]

use asterprep::core::aoi::{AreaOfInterest, ProjectedAoi};
use asterprep::core::calibrate::reflectance_factor;
use asterprep::core::coefficients::{solar_irradiance, thermal_constants};
use asterprep::io::{WaterLayer, WaterOccurrenceSource};
use asterprep::{
    AsterError, AsterResult, Band, GeoTransform, MaskedBand, RasterGrid, Scene, SceneMetadata, Units,
};
use chrono::{Datelike, TimeZone, Utc};
use geo::{polygon, Polygon};
use ndarray::Array2;
use std::collections::BTreeMap;

pub const GAIN: f64 = 0.5;
pub const PIXEL_SIZE: f64 = 60.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Square AOI with its south-west corner at (lon, lat)
pub fn aoi_square(lon: f64, lat: f64, size_deg: f64) -> Polygon<f64> {
    polygon![
        (x: lon, y: lat),
        (x: lon + size_deg, y: lat),
        (x: lon + size_deg, y: lat + size_deg),
        (x: lon, y: lat + size_deg),
        (x: lon, y: lat),
    ]
}

pub fn projected(polygon: &Polygon<f64>) -> ProjectedAoi {
    ProjectedAoi::new(&AreaOfInterest::from(polygon.clone())).expect("valid AOI")
}

/// North-up grid in the AOI's UTM zone covering the AOI plus `margin_px` pixels
pub fn grid_over(aoi: &ProjectedAoi, margin_px: usize) -> RasterGrid {
    let xs: Vec<f64> = aoi.projected.exterior().coords().map(|c| c.x).collect();
    let ys: Vec<f64> = aoi.projected.exterior().coords().map(|c| c.y).collect();
    let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let pad = margin_px as f64 * PIXEL_SIZE;
    let cols = ((max_x - min_x + 2.0 * pad) / PIXEL_SIZE).ceil() as usize;
    let rows = ((max_y - min_y + 2.0 * pad) / PIXEL_SIZE).ceil() as usize;
    RasterGrid::new(
        aoi.crs,
        GeoTransform::north_up(min_x - pad, max_y + pad, PIXEL_SIZE),
        rows,
        cols,
    )
}

/// Physical value per band for a clear, snow-free land pixel
pub fn clear_pixel(band: Band) -> f64 {
    match band {
        Band::B01 => 0.10,
        Band::B02 => 0.06,
        Band::B3N => 0.25,
        Band::B04 => 0.20,
        b if b.is_reflective() => 0.15,
        _ => 295.0,
    }
}

/// Physical value per band for an opaque cold cloud
pub fn cloud_pixel(band: Band) -> f64 {
    match band {
        Band::B01 => 0.50,
        Band::B02 => 0.45,
        Band::B3N => 0.50,
        Band::B04 => 0.30,
        b if b.is_reflective() => 0.30,
        _ => 260.0,
    }
}

/// Physical value per band for fresh snow
pub fn snow_pixel(band: Band) -> f64 {
    match band {
        Band::B01 => 0.80,
        Band::B02 => 0.75,
        Band::B3N => 0.70,
        Band::B04 => 0.10,
        b if b.is_reflective() => 0.05,
        _ => 270.0,
    }
}

/// DN that converts to `target` (reflectance or kelvin) with gain [`GAIN`]
pub fn dn_for(band: Band, target: f64, day_of_year: u32, solar_elevation: f64) -> f32 {
    let radiance = if let Some(irradiance) = solar_irradiance(band) {
        target * irradiance / reflectance_factor(day_of_year, solar_elevation)
    } else {
        let k = thermal_constants(band).expect("thermal band");
        k.k1 / ((k.k2 / target).exp() - 1.0)
    };
    (radiance / GAIN + 1.0) as f32
}

pub struct SceneBuilder {
    pub id: String,
    pub date: (i32, u32, u32),
    pub grid: RasterGrid,
    pub bands: Vec<Band>,
    pub present: Vec<Band>,
    pub solar_elevation: f64,
    pub cloud_cover: f64,
    pub drop_gain: Option<Band>,
}

impl SceneBuilder {
    pub fn new(id: &str, grid: RasterGrid) -> Self {
        Self {
            id: id.to_string(),
            date: (2019, 7, 1),
            grid,
            bands: Band::ALL.to_vec(),
            present: Band::ALL.to_vec(),
            solar_elevation: 60.0,
            cloud_cover: 5.0,
            drop_gain: None,
        }
    }

    pub fn date(mut self, year: i32, month: u32, day: u32) -> Self {
        self.date = (year, month, day);
        self
    }

    pub fn bands(mut self, bands: &[Band]) -> Self {
        self.bands = bands.to_vec();
        self.present = bands.to_vec();
        self
    }

    pub fn cloud_cover(mut self, cloud_cover: f64) -> Self {
        self.cloud_cover = cloud_cover;
        self
    }

    pub fn without_gain(mut self, band: Band) -> Self {
        self.drop_gain = Some(band);
        self
    }

    /// Build with per-pixel physical targets; `None` writes the DN fill value
    pub fn build<F>(self, target: F) -> Scene
    where
        F: Fn(Band, usize, usize) -> Option<f64>,
    {
        let (y, m, d) = self.date;
        let acquired = Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap();
        let doy = acquired.ordinal0();

        let mut bands = BTreeMap::new();
        for &band in &self.bands {
            let values = Array2::from_shape_fn(self.grid.dim(), |(r, c)| match target(band, r, c) {
                Some(t) => dn_for(band, t, doy, self.solar_elevation),
                None => 0.0,
            });
            bands.insert(band, MaskedBand::from_dn(values));
        }
        let gain_coefficients = self
            .bands
            .iter()
            .filter(|&&b| Some(b) != self.drop_gain)
            .map(|&b| (b, GAIN))
            .collect();
        let metadata = SceneMetadata {
            scene_id: self.id,
            acquired,
            original_bands_present: self.present.iter().copied().collect(),
            gain_coefficients,
            solar_elevation: self.solar_elevation,
            cloud_cover: self.cloud_cover,
        };
        Scene::new(metadata, self.grid, bands).unwrap()
    }

    pub fn build_clear(self) -> Scene {
        self.build(|band, _, _| Some(clear_pixel(band)))
    }
}

/// Scene already in physical units: reflectance for VIS/SWIR, kelvin for TIR
pub fn physical_scene<F>(grid: RasterGrid, bands: &[Band], target: F) -> Scene
where
    F: Fn(Band, usize, usize) -> f64,
{
    let mut data = BTreeMap::new();
    for &band in bands {
        let values = Array2::from_shape_fn(grid.dim(), |(r, c)| target(band, r, c) as f32);
        let units = if band.is_thermal() { Units::BrightnessTemperature } else { Units::Reflectance };
        data.insert(
            band,
            MaskedBand::new(values, Array2::from_elem(grid.dim(), true), units).unwrap(),
        );
    }
    let metadata = SceneMetadata {
        scene_id: "physical".to_string(),
        acquired: Utc.with_ymd_and_hms(2019, 7, 1, 10, 30, 0).unwrap(),
        original_bands_present: bands.iter().copied().collect(),
        gain_coefficients: BTreeMap::new(),
        solar_elevation: 60.0,
        cloud_cover: 0.0,
    };
    Scene::new(metadata, grid, data).unwrap()
}

pub fn valid_mask(scene: &Scene, band: Band) -> Array2<bool> {
    scene.band(band).expect("band present").valid.clone()
}

/// Water history whose monthly files cannot be read
pub struct UnreadableHistory;

impl WaterOccurrenceSource for UnreadableHistory {
    fn monthly_layers(&self, year: i32, month: u32, _grid: &RasterGrid) -> AsterResult<Vec<WaterLayer>> {
        Err(AsterError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}_{:02}.tif is truncated", year, month),
        )))
    }
}
