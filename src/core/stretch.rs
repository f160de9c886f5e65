//! Percentile statistics for display stretching

use crate::types::{AsterError, AsterResult, Band, MaskedBand};
use num_traits::{Float, NumCast};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower and upper percentiles used for the default stretch
pub const STRETCH_PERCENTILES: (f64, f64) = (5.0, 95.0);

fn sort_finite<T: Float>(values: &mut Vec<T>) {
    values.retain(|v| v.is_finite());
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Percentile `p` (0-100) with linear interpolation between ranks; NaN/inf ignored
pub fn percentile<T: Float>(mut values: Vec<T>, p: f64) -> Option<T> {
    sort_finite(&mut values);
    if values.is_empty() {
        return None;
    }
    let rank = (p.max(0.0).min(100.0) / 100.0) * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = <T as NumCast>::from(rank - lower as f64)?;
    Some(values[lower] + (values[upper] - values[lower]) * weight)
}

/// Median; even counts average the two middle values
pub fn median<T: Float>(mut values: Vec<T>) -> Option<T> {
    sort_finite(&mut values);
    let n = values.len();
    if n == 0 {
        None
    } else if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        let two = T::one() + T::one();
        Some((values[n / 2 - 1] + values[n / 2]) / two)
    }
}

/// Display range per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub bands: Vec<Band>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

/// 5th/95th percentile of the valid pixels of each selected band
pub fn vis_params(bands: &BTreeMap<Band, MaskedBand>, selection: &[Band]) -> AsterResult<VisParams> {
    let (low, high) = STRETCH_PERCENTILES;
    let mut params = VisParams { bands: Vec::new(), min: Vec::new(), max: Vec::new() };

    for &band in selection {
        let data = bands
            .get(&band)
            .ok_or_else(|| AsterError::InvalidInput(format!("Band {} is not in the image", band)))?;
        let values: Vec<f64> = data
            .values
            .iter()
            .zip(data.valid.iter())
            .filter(|&(_, &v)| v)
            .map(|(&x, _)| x as f64)
            .collect();

        let (min, max) = match (percentile(values.clone(), low), percentile(values, high)) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                return Err(AsterError::Processing(format!(
                    "Band {} has no valid pixels to stretch",
                    band
                )))
            }
        };
        log::debug!("Stretch {}: [{:.4}, {:.4}]", band, min, max);
        params.bands.push(band);
        params.min.push(min);
        params.max.push(max);
    }
    Ok(params)
}
