//! ASTER quality masks: cloud (NACMA first pass), snow and surface water.
//!
//! Every mask only removes pixels from the scene's existing validity masks, so
//! the cascade is commutative: applying the masks in any order yields the same
//! final mask. The cascade still runs them in the fixed order cloud, snow, water.
//!
//! Based on:
//! - Hulley, G. C. & Hook, S. J. (2008). A new methodology for cloud detection and
//!   classification with ASTER data. Geophys. Res. Lett. 35, L16812.
//! - Pekel, J.-F. et al. (2016). High-resolution mapping of global surface water
//!   and its long-term changes. Nature 540, 418-422.

use crate::core::bands::{mask_required_bands, ordered_masks};
use crate::io::source::{WaterLayer, WaterOccurrenceSource, WATER_CLASS};
use crate::types::{
    Advisory, AsterError, AsterResult, Band, BandSet, MaskKind, MaskedBand, Scene, Units,
};
use ndarray::{Array2, Zip};

/// NDSI threshold above which a pixel is treated as snow
pub const SNOW_NDSI_THRESHOLD: f32 = 0.4;

/// Normalized difference snow index from B01 and B04 reflectance
pub fn ndsi(b01: f32, b04: f32) -> f32 {
    (b01 - b04) / (b01 + b04)
}

/// Reflectance / temperature values of one pixel used by the cloud tests
#[derive(Debug, Clone, Copy)]
pub struct CloudPixel {
    pub b01: f32,
    pub b02: f32,
    pub b3n: f32,
    pub b04: f32,
    pub b13: f32,
}

/// A single NACMA test; true when the pixel is still a cloud candidate
pub type CloudFilter = fn(&CloudPixel) -> bool;

fn b02_brightness(p: &CloudPixel) -> bool {
    p.b02 > 0.08
}

fn snow_index(p: &CloudPixel) -> bool {
    ndsi(p.b01, p.b04) < 0.7
}

fn b13_temperature(p: &CloudPixel) -> bool {
    p.b13 < 300.0
}

fn band_4_13_composite(p: &CloudPixel) -> bool {
    (1.0 - p.b04) * p.b13 < 240.0
}

fn b3n_b02_ratio(p: &CloudPixel) -> bool {
    p.b3n / p.b02 < 2.0
}

fn b3n_b01_ratio(p: &CloudPixel) -> bool {
    p.b3n / p.b01 < 2.3
}

fn b3n_b04_ratio(p: &CloudPixel) -> bool {
    p.b3n / p.b04 > 0.83
}

/// The seven first-pass NACMA filters, applied in order
pub const NACMA_FIRST_PASS: [(&str, CloudFilter); 7] = [
    ("B02 brightness", b02_brightness),
    ("NDSI", snow_index),
    ("B13 temperature", b13_temperature),
    ("band 4-13 composite", band_4_13_composite),
    ("B3N/B02 ratio", b3n_b02_ratio),
    ("B3N/B01 ratio", b3n_b01_ratio),
    ("B3N/B04 ratio", b3n_b04_ratio),
];

fn expected_units(band: Band) -> Units {
    if band.is_thermal() {
        Units::BrightnessTemperature
    } else {
        Units::Reflectance
    }
}

/// Required bands of `mask` that are absent or not yet in physical units
pub fn unavailable_bands(scene: &Scene, mask: MaskKind) -> BandSet {
    mask_required_bands(mask)
        .iter()
        .filter(|&band| {
            !scene.has_band(band)
                || scene.band(band).map(|d| d.units != expected_units(band)).unwrap_or(true)
        })
        .collect()
}

/// Returns the bands, or records a `MaskSkipped` advisory
fn mask_inputs<'a>(scene: &'a Scene, mask: MaskKind) -> Result<Vec<&'a MaskedBand>, Advisory> {
    let missing = unavailable_bands(scene, mask);
    if !missing.is_empty() {
        return Err(Advisory::MaskSkipped {
            scene_id: scene.id().to_string(),
            mask,
            missing,
        });
    }
    Ok(mask_required_bands(mask)
        .iter()
        .filter_map(|band| scene.band(band))
        .collect())
}

/// Pixels classified as cloud by the NACMA first pass
///
/// The scratch mask starts as the joint validity of the input bands and is
/// narrowed by each filter in turn; whatever survives all seven is cloud.
pub fn classify_clouds(scene: &Scene) -> Option<Array2<bool>> {
    let b01 = scene.band(Band::B01)?;
    let b02 = scene.band(Band::B02)?;
    let b3n = scene.band(Band::B3N)?;
    let b04 = scene.band(Band::B04)?;
    let b13 = scene.band(Band::B13)?;

    let mut scratch = Array2::from_elem(scene.grid.dim(), false);
    Zip::from(&mut scratch)
        .and(&b01.valid)
        .and(&b02.valid)
        .and(&b3n.valid)
        .and(&b04.valid)
        .and(&b13.valid)
        .for_each(|s, &v1, &v2, &v3, &v4, &v13| *s = v1 && v2 && v3 && v4 && v13);

    for (name, filter) in NACMA_FIRST_PASS.iter() {
        Zip::from(&mut scratch)
            .and(&b01.values)
            .and(&b02.values)
            .and(&b3n.values)
            .and(&b04.values)
            .and(&b13.values)
            .for_each(|s, &b01, &b02, &b3n, &b04, &b13| {
                if *s {
                    *s = filter(&CloudPixel { b01, b02, b3n, b04, b13 });
                }
            });
        log::debug!(
            "Scene {}: {} cloud candidates after {} filter",
            scene.id(),
            scratch.iter().filter(|&&c| c).count(),
            name
        );
    }

    Some(scratch)
}

/// Mask out NACMA cloud pixels
pub fn cloud_mask(mut scene: Scene) -> Scene {
    if let Err(advisory) = mask_inputs(&scene, MaskKind::Cloud) {
        scene.advise(advisory);
        return scene;
    }
    if let Some(clouds) = classify_clouds(&scene) {
        let cloud_pixels = clouds.iter().filter(|&&c| c).count();
        log::info!("Scene {}: masking {} cloud pixels", scene.id(), cloud_pixels);
        let keep = clouds.mapv(|c| !c);
        scene.narrow_mask(&keep);
    }
    scene
}

/// Keep only pixels with valid B01/B04 and NDSI below the snow threshold
pub fn snow_mask(mut scene: Scene) -> Scene {
    let keep = match mask_inputs(&scene, MaskKind::Snow) {
        Ok(inputs) => {
            let (b01, b04) = (inputs[0], inputs[1]);
            let mut keep = Array2::from_elem(scene.grid.dim(), false);
            Zip::from(&mut keep)
                .and(&b01.values)
                .and(&b01.valid)
                .and(&b04.values)
                .and(&b04.valid)
                .for_each(|k, &r1, &v1, &r4, &v4| {
                    *k = v1 && v4 && ndsi(r1, r4) < SNOW_NDSI_THRESHOLD;
                });
            keep
        }
        Err(advisory) => {
            scene.advise(advisory);
            return scene;
        }
    };
    log::info!(
        "Scene {}: snow mask keeps {} pixels",
        scene.id(),
        keep.iter().filter(|&&k| k).count()
    );
    scene.narrow_mask(&keep);
    scene
}

/// Per-pixel most frequent class across layers; ties go to the lower class
pub fn mode_reduce(layers: &[WaterLayer], dim: (usize, usize)) -> AsterResult<(Array2<u8>, Array2<bool>)> {
    for layer in layers {
        if layer.classes.dim() != dim {
            return Err(AsterError::Processing(format!(
                "Water layer shape {:?} does not match scene grid {:?}",
                layer.classes.dim(),
                dim
            )));
        }
    }

    let mut classes = Array2::<u8>::zeros(dim);
    let mut valid = Array2::from_elem(dim, false);
    for ((i, j), class) in classes.indexed_iter_mut() {
        let samples: Vec<u8> = layers
            .iter()
            .filter(|layer| layer.valid[[i, j]])
            .map(|layer| layer.classes[[i, j]])
            .collect();
        let mut best: Option<(u8, usize)> = None;
        for &candidate in &samples {
            let count = samples.iter().filter(|&&s| s == candidate).count();
            best = match best {
                Some((value, n)) if n > count || (n == count && value <= candidate) => Some((value, n)),
                _ => Some((candidate, count)),
            };
        }
        if let Some((value, _)) = best {
            *class = value;
            valid[[i, j]] = true;
        }
    }
    Ok((classes, valid))
}

/// Mask out pixels classified as water in the acquisition month
pub fn water_mask(mut scene: Scene, water: &dyn WaterOccurrenceSource) -> AsterResult<Scene> {
    let (year, month) = scene.metadata.year_month();
    let layers = water.monthly_layers(year, month, &scene.grid).map_err(|e| {
        AsterError::Processing(format!(
            "Water reference for {}-{:02} unavailable for scene {}: {}",
            year,
            month,
            scene.id(),
            e
        ))
    })?;
    if layers.is_empty() {
        let scene_id = scene.id().to_string();
        scene.advise(Advisory::WaterReferenceUnavailable { scene_id, year, month });
        return Ok(scene);
    }

    let (classes, valid) = mode_reduce(&layers, scene.grid.dim())?;
    let keep = Zip::from(&classes)
        .and(&valid)
        .map_collect(|&class, &v| v && class != WATER_CLASS);
    log::info!(
        "Scene {}: water mask for {}-{:02} from {} layer(s) keeps {} pixels",
        scene.id(),
        year,
        month,
        layers.len(),
        keep.iter().filter(|&&k| k).count()
    );
    scene.narrow_mask(&keep);
    Ok(scene)
}

/// Ordered set of masks applied to each scene
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCascade {
    masks: Vec<MaskKind>,
}

impl MaskCascade {
    pub fn new(masks: &[MaskKind]) -> Self {
        Self { masks: ordered_masks(masks) }
    }

    pub fn masks(&self) -> &[MaskKind] {
        &self.masks
    }

    pub fn needs_water_reference(&self) -> bool {
        self.masks.contains(&MaskKind::Water)
    }

    /// Apply one mask
    pub fn apply_mask(
        kind: MaskKind,
        scene: Scene,
        water: Option<&dyn WaterOccurrenceSource>,
    ) -> AsterResult<Scene> {
        match kind {
            MaskKind::Cloud => Ok(cloud_mask(scene)),
            MaskKind::Snow => Ok(snow_mask(scene)),
            MaskKind::Water => {
                let source = water.ok_or_else(|| {
                    AsterError::Config("Water mask requested without a water reference".to_string())
                })?;
                water_mask(scene, source)
            }
        }
    }

    pub fn apply(&self, scene: Scene, water: Option<&dyn WaterOccurrenceSource>) -> AsterResult<Scene> {
        self.masks
            .iter()
            .try_fold(scene, |scene, &kind| Self::apply_mask(kind, scene, water))
    }
}
