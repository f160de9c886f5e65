//! asterprep: radiometric calibration and quality masking for ASTER L1T scenes
//!
//! Converts Level-1T digital numbers to at-sensor radiance, top-of-atmosphere
//! reflectance and brightness temperature, applies cloud, snow and water
//! masks, and filters scene collections by their coverage of an area of
//! interest before compositing.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    Advisory, AsterError, AsterResult, Band, BandSet, Crs, GeoTransform, MaskKind, MaskedBand,
    RasterGrid, Scene, SceneMetadata, Units,
};
pub use config::PipelineConfig;
pub use io::{InMemoryCatalog, InMemoryWaterHistory, RasterSource, WaterOccurrenceSource};
pub use crate::core::{
    AreaOfInterest, CollectionPipeline, Composite, MaskCascade, PipelineOutput, PipelinePlan,
    RadiometricConverter,
};

#[cfg(feature = "python")]
mod python {
    use crate::core::calibrate::{brightness_temperature, dn_to_radiance, reflectance_factor};
    use crate::core::coefficients::{solar_irradiance, thermal_constants};
    use crate::types::{AsterError, Band, BandSet, MaskKind};
    use numpy::{PyReadonlyArray2, ToPyArray};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    fn to_py_err(e: AsterError) -> PyErr {
        match e {
            AsterError::InvalidInput(_) | AsterError::Config(_) => PyValueError::new_err(e.to_string()),
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }

    fn parse_band(band: &str) -> PyResult<Band> {
        band.parse::<Band>().map_err(to_py_err)
    }

    /// DN to radiance; DN 0 (fill) becomes NaN
    #[pyfunction]
    fn radiance(py: Python, dn: PyReadonlyArray2<f32>, gain: f64) -> PyResult<PyObject> {
        let out = dn.as_array().mapv(|v| {
            if v == 0.0 {
                f32::NAN
            } else {
                dn_to_radiance(v as f64, gain) as f32
            }
        });
        Ok(out.to_pyarray(py).into())
    }

    /// Radiance to TOA reflectance for a VIS/SWIR band
    #[pyfunction]
    fn reflectance(
        py: Python,
        radiance: PyReadonlyArray2<f32>,
        band: &str,
        day_of_year: u32,
        solar_elevation: f64,
    ) -> PyResult<PyObject> {
        let band = parse_band(band)?;
        let irradiance = solar_irradiance(band)
            .ok_or_else(|| PyValueError::new_err(format!("{} is not a VIS/SWIR band", band)))?;
        let factor = reflectance_factor(day_of_year, solar_elevation);
        let out = radiance
            .as_array()
            .mapv(|l| (l as f64 * factor / irradiance) as f32);
        Ok(out.to_pyarray(py).into())
    }

    /// Radiance to brightness temperature (K) for a TIR band
    #[pyfunction]
    #[pyo3(name = "brightness_temperature")]
    fn temperature(py: Python, radiance: PyReadonlyArray2<f32>, band: &str) -> PyResult<PyObject> {
        let band = parse_band(band)?;
        let constants = thermal_constants(band)
            .ok_or_else(|| PyValueError::new_err(format!("{} is not a TIR band", band)))?;
        let out = radiance
            .as_array()
            .mapv(|l| brightness_temperature(l as f64, constants) as f32);
        Ok(out.to_pyarray(py).into())
    }

    /// Bands needed for the requested outputs and masks
    #[pyfunction]
    fn resolve_bands(bands: Vec<String>, masks: Vec<String>) -> PyResult<Vec<String>> {
        let requested = bands
            .iter()
            .map(|b| parse_band(b))
            .collect::<PyResult<BandSet>>()?;
        let masks = masks
            .iter()
            .map(|m| m.parse::<MaskKind>().map_err(to_py_err))
            .collect::<PyResult<Vec<MaskKind>>>()?;
        Ok(crate::core::bands::resolve_bands(&requested, &masks)
            .iter()
            .map(|b| b.code().to_string())
            .collect())
    }

    /// EPSG code of the UTM zone containing (lat, lon)
    #[pyfunction]
    fn utm_epsg(lat: f64, lon: f64) -> u32 {
        crate::core::projection::utm_epsg(lat, lon)
    }

    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(radiance, m)?)?;
        m.add_function(wrap_pyfunction!(reflectance, m)?)?;
        m.add_function(wrap_pyfunction!(temperature, m)?)?;
        m.add_function(wrap_pyfunction!(resolve_bands, m)?)?;
        m.add_function(wrap_pyfunction!(utm_epsg, m)?)?;
        Ok(())
    }
}
