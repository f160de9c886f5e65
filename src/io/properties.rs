//! Typed scene metadata from the imagery service's flat property map

use crate::types::{AsterError, AsterResult, Band, BandSet, SceneMetadata};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SCENE_ID: &str = "system:index";
const TIME_START: &str = "system:time_start";
const BANDS_PRESENT: &str = "ORIGINAL_BANDS_PRESENT";
const SOLAR_ELEVATION: &str = "SOLAR_ELEVATION";
const CLOUD_COVER: &str = "CLOUDCOVER";

fn number(props: &Map<String, Value>, key: &str, scene_id: &str) -> AsterResult<f64> {
    props
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| AsterError::Metadata(format!("Scene {}: {} missing or not a number", scene_id, key)))
}

fn acquisition_time(props: &Map<String, Value>, scene_id: &str) -> AsterResult<DateTime<Utc>> {
    let millis = props
        .get(TIME_START)
        .and_then(Value::as_i64)
        .ok_or_else(|| AsterError::Metadata(format!("Scene {}: {} missing", scene_id, TIME_START)))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AsterError::Metadata(format!("Scene {}: invalid timestamp {}", scene_id, millis)))
}

fn bands_present(props: &Map<String, Value>, scene_id: &str) -> AsterResult<BandSet> {
    let list = props
        .get(BANDS_PRESENT)
        .and_then(Value::as_array)
        .ok_or_else(|| AsterError::Metadata(format!("Scene {}: {} missing", scene_id, BANDS_PRESENT)))?;
    list.iter()
        .map(|value| {
            value
                .as_str()
                .ok_or_else(|| AsterError::Metadata(format!("Scene {}: non-string band code", scene_id)))?
                .parse::<Band>()
                .map_err(|e| AsterError::Metadata(format!("Scene {}: {}", scene_id, e)))
        })
        .collect()
}

fn gain_coefficients(props: &Map<String, Value>, scene_id: &str) -> AsterResult<BTreeMap<Band, f64>> {
    let pattern = Regex::new(r"^GAIN_COEFFICIENT_(B\d\d|B3N)$")
        .map_err(|e| AsterError::Processing(format!("Invalid gain pattern: {}", e)))?;
    let mut gains = BTreeMap::new();
    for (key, value) in props {
        let band = match pattern.captures(key).and_then(|caps| caps.get(1)) {
            Some(code) => code
                .as_str()
                .parse::<Band>()
                .map_err(|e| AsterError::Metadata(format!("Scene {}: {}", scene_id, e)))?,
            None => continue,
        };
        let gain = value.as_f64().ok_or_else(|| {
            AsterError::Metadata(format!("Scene {}: {} is not a number", scene_id, key))
        })?;
        gains.insert(band, gain);
    }
    Ok(gains)
}

impl SceneMetadata {
    /// Parse `system:index`, `system:time_start` (ms), ORIGINAL_BANDS_PRESENT,
    /// GAIN_COEFFICIENT_<band>, SOLAR_ELEVATION and CLOUDCOVER
    pub fn from_properties(properties: &Value) -> AsterResult<Self> {
        let props = properties
            .as_object()
            .ok_or_else(|| AsterError::InvalidInput("Scene properties must be a JSON object".to_string()))?;
        let scene_id = props
            .get(SCENE_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| AsterError::Metadata(format!("Scene property {} missing", SCENE_ID)))?
            .to_string();

        let metadata = SceneMetadata {
            acquired: acquisition_time(props, &scene_id)?,
            original_bands_present: bands_present(props, &scene_id)?,
            gain_coefficients: gain_coefficients(props, &scene_id)?,
            solar_elevation: number(props, SOLAR_ELEVATION, &scene_id)?,
            cloud_cover: number(props, CLOUD_COVER, &scene_id)?,
            scene_id,
        };
        log::debug!(
            "Scene {}: bands {}, {} gain coefficient(s)",
            metadata.scene_id,
            metadata.original_bands_present,
            metadata.gain_coefficients.len()
        );
        Ok(metadata)
    }
}
