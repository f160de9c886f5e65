//! Core ASTER processing modules

pub mod coefficients;
pub mod calibrate;
pub mod bands;
pub mod masking;
pub mod projection;
pub mod aoi;
pub mod coverage;
pub mod composite;
pub mod stretch;
pub mod pipeline;

// Re-export main types
pub use calibrate::RadiometricConverter;
pub use bands::{resolve_bands, mask_required_bands, default_required_bands};
pub use masking::{MaskCascade, cloud_mask, snow_mask, water_mask};
pub use projection::{utm_epsg, utm_zone, TransverseMercator};
pub use aoi::{AreaOfInterest, Feature, ProjectedAoi};
pub use coverage::{clip_to_aoi, compute_coverage, CoverageFilter};
pub use composite::{median_composite, Composite};
pub use stretch::{vis_params, VisParams};
pub use pipeline::{CollectionPipeline, PipelineOutput, PipelinePlan, PipelineReport};
