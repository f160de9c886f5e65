//! Collection pipeline: query, metadata filter, per-scene conversion and
//! masking, clip, coverage filter and optional median composite.
//!
//! A [`PipelinePlan`] is an immutable description of the run. It is evaluated
//! against injected collaborators by a [`CollectionPipeline`].

use crate::config::PipelineConfig;
use crate::core::aoi::{AreaOfInterest, ProjectedAoi};
use crate::core::bands::{default_required_bands, resolve_bands};
use crate::core::calibrate::RadiometricConverter;
use crate::core::composite::{median_composite, Composite};
use crate::core::coverage::{clip_to_aoi, with_coverage, CoverageFilter};
use crate::core::masking::MaskCascade;
use crate::io::source::{RasterSource, SceneQuery, WaterOccurrenceSource};
use crate::types::{AsterError, AsterResult, Band, BandSet, Scene};
use chrono::NaiveDate;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Immutable run description
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub collection: String,
    /// Bands the user asked for
    pub requested_bands: BandSet,
    /// Requested bands plus every band the masks depend on
    pub bands: BandSet,
    pub cascade: MaskCascade,
    /// Bands ORIGINAL_BANDS_PRESENT must contain
    pub required_bands: BandSet,
    pub max_cloud_cover: f64,
    pub coverage: CoverageFilter,
    pub composite: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PipelinePlan {
    pub fn from_config(config: &PipelineConfig) -> AsterResult<Self> {
        config.validate()?;

        let requested_bands: BandSet = config.bands.iter().copied().collect();
        let cascade = MaskCascade::new(&config.masks);
        let bands = resolve_bands(&requested_bands, cascade.masks());
        let required_bands = match &config.required_bands {
            Some(required) => required.iter().copied().collect(),
            None => default_required_bands().union(&bands),
        };

        log::info!(
            "Plan: collection {}, bands {}, masks {:?}, required {}",
            config.collection,
            bands,
            cascade.masks(),
            required_bands
        );

        Ok(Self {
            collection: config.collection.clone(),
            requested_bands,
            bands,
            cascade,
            required_bands,
            max_cloud_cover: config.max_cloud_cover,
            coverage: CoverageFilter::new(config.coverage_threshold)?,
            composite: config.composite,
            start_date: config.start_date,
            end_date: config.end_date,
        })
    }

    pub fn converter(&self) -> RadiometricConverter {
        RadiometricConverter::new(self.bands.clone())
    }
}

/// Scenes dropped or failed during a run, by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub queried: usize,
    pub missing_bands: Vec<String>,
    pub too_cloudy: Vec<String>,
    /// Scene-scoped failures with their error message
    pub failed: Vec<(String, String)>,
    pub below_coverage: Vec<String>,
    /// Kept scenes whose band was left out of the composite for its units
    pub composite_excluded: Vec<(String, Band)>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Processed scenes that passed every filter, earliest first
    pub scenes: Vec<Scene>,
    pub composite: Option<Composite>,
    pub report: PipelineReport,
}

/// Keep scenes whose ORIGINAL_BANDS_PRESENT contains every required band
pub fn bands_present_filter(scenes: Vec<Scene>, required: &BandSet) -> (Vec<Scene>, Vec<String>) {
    let (kept, rejected): (Vec<Scene>, Vec<Scene>) = scenes
        .into_iter()
        .partition(|scene| required.is_subset(&scene.metadata.original_bands_present));
    for scene in &rejected {
        log::info!(
            "Dropping scene {}: missing bands {}",
            scene.id(),
            required.difference(&scene.metadata.original_bands_present)
        );
    }
    (kept, rejected.into_iter().map(|s| s.metadata.scene_id).collect())
}

/// Keep scenes with CLOUDCOVER at or below `max_cloud_cover`
pub fn cloud_cover_filter(scenes: Vec<Scene>, max_cloud_cover: f64) -> (Vec<Scene>, Vec<String>) {
    let (kept, rejected): (Vec<Scene>, Vec<Scene>) = scenes
        .into_iter()
        .partition(|scene| scene.metadata.cloud_cover <= max_cloud_cover);
    for scene in &rejected {
        log::info!(
            "Dropping scene {}: cloud cover {:.1}% above {:.1}%",
            scene.id(),
            scene.metadata.cloud_cover,
            max_cloud_cover
        );
    }
    (kept, rejected.into_iter().map(|s| s.metadata.scene_id).collect())
}

/// Evaluates plans against a raster source and optional water reference
pub struct CollectionPipeline<'a> {
    source: &'a dyn RasterSource,
    water: Option<&'a dyn WaterOccurrenceSource>,
}

impl<'a> CollectionPipeline<'a> {
    pub fn new(source: &'a dyn RasterSource) -> Self {
        Self { source, water: None }
    }

    pub fn with_water_reference(mut self, water: &'a dyn WaterOccurrenceSource) -> Self {
        self.water = Some(water);
        self
    }

    fn check_collaborators(&self, plan: &PipelinePlan) -> AsterResult<()> {
        if plan.cascade.needs_water_reference() && self.water.is_none() {
            return Err(AsterError::Config(
                "Water mask requested but no water reference was supplied".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert, mask, clip and score one scene
    pub fn process_scene(&self, plan: &PipelinePlan, scene: Scene, aoi: &ProjectedAoi) -> AsterResult<Scene> {
        let scene = plan.converter().dn_to_toa(scene)?;
        let scene = plan.cascade.apply(scene, self.water)?;
        let scene = clip_to_aoi(scene, aoi);
        Ok(with_coverage(scene, aoi))
    }

    /// Single-scene entry point
    pub fn run_scene(&self, plan: &PipelinePlan, scene: Scene, aoi: &AreaOfInterest) -> AsterResult<Scene> {
        self.check_collaborators(plan)?;
        let aoi = ProjectedAoi::new(aoi)?;
        self.process_scene(plan, scene, &aoi)
    }

    pub fn run(&self, plan: &PipelinePlan, aoi: &AreaOfInterest) -> AsterResult<PipelineOutput> {
        self.check_collaborators(plan)?;
        let aoi = ProjectedAoi::new(aoi)?;
        let mut report = PipelineReport::default();

        let query = SceneQuery::new(plan.collection.clone(), aoi.lon_lat.clone())
            .with_dates(plan.start_date, plan.end_date);
        let scenes = self.source.query(&query)?;
        report.queried = scenes.len();
        log::info!("Query on {} returned {} scene(s)", plan.collection, scenes.len());

        let (scenes, missing) = bands_present_filter(scenes, &plan.required_bands);
        report.missing_bands = missing;
        let (scenes, cloudy) = cloud_cover_filter(scenes, plan.max_cloud_cover);
        report.too_cloudy = cloudy;

        let process = |scene: Scene| {
            let id = scene.id().to_string();
            (id, self.process_scene(plan, scene, &aoi))
        };
        #[cfg(feature = "parallel")]
        let results: Vec<(String, AsterResult<Scene>)> = scenes.into_par_iter().map(process).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<(String, AsterResult<Scene>)> = scenes.into_iter().map(process).collect();

        let mut processed = Vec::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(scene) => processed.push(scene),
                Err(e) if e.is_scene_scoped() => {
                    log::warn!("Skipping scene {}: {}", id, e);
                    report.failed.push((id, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let (mut scenes, below) = plan.coverage.apply(processed);
        report.below_coverage = below;
        scenes.sort_by(|a, b| (a.metadata.acquired, a.id()).cmp(&(b.metadata.acquired, b.id())));

        let composite = if plan.composite {
            median_composite(&scenes, Some(&aoi))?
        } else {
            None
        };
        if let Some(composite) = &composite {
            report.composite_excluded = composite.excluded.clone();
        }

        log::info!(
            "✅ Pipeline finished: {} of {} scene(s) kept",
            scenes.len(),
            report.queried
        );
        Ok(PipelineOutput { scenes, composite, report })
    }
}
