// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end overlay generation.
//!
//! Stages run strictly in order; each takes the previous stage's feature set
//! by reference and returns a fresh copy:
//!
//! 1. resolve perimeter
//! 2. detect features (oracle)
//! 3. apply tenant correction bias
//! 4. snap endpoints
//! 5. validate connectivity
//! 6. feedback retry, only when step 5 found floating endpoints
//! 7. alignment refinement loop
//! 8. final snap + validation, flagging lines left floating
//! 9. quality score

use std::sync::Arc;

use image::RgbaImage;
use time::OffsetDateTime;

use crate::alignment::refine_alignment;
use crate::config::PipelineConfig;
use crate::connectivity::{find_floating, flag_floating};
use crate::correction::{load_bias, CorrectionStore};
use crate::error::{Error, Result};
use crate::oracle::{AlignmentVerifier, FeatureDetector, SceneContext};
use crate::perimeter::{resolve_perimeter, PerimeterSource};
use crate::projection::Projector;
use crate::retry::feedback_retry;
use crate::scoring::assess_quality;
use crate::snapping::snap_features;
use crate::types::{DetectedFeatureSet, GeoPoint, OverlayMetadata, OverlayResult};

/// One overlay request.
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub center: GeoPoint,
    pub address: Option<String>,
    pub image_url: String,
    /// Decoded source image, if the caller fetched it
    pub base_image: Option<Arc<RgbaImage>>,
    pub tenant_id: Option<String>,
}

/// The reconstruction pipeline with its injected collaborators.
///
/// Holds no per-request state; one instance serves concurrent requests.
#[derive(Clone)]
pub struct RoofLinePipeline {
    config: PipelineConfig,
    perimeter_source: Arc<dyn PerimeterSource>,
    detector: Arc<dyn FeatureDetector>,
    verifier: Arc<dyn AlignmentVerifier>,
    corrections: Arc<dyn CorrectionStore>,
}

impl RoofLinePipeline {
    pub fn new(
        config: PipelineConfig,
        perimeter_source: Arc<dyn PerimeterSource>,
        detector: Arc<dyn FeatureDetector>,
        verifier: Arc<dyn AlignmentVerifier>,
        corrections: Arc<dyn CorrectionStore>,
    ) -> Self {
        Self {
            config,
            perimeter_source,
            detector,
            verifier,
            corrections,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generates the roof overlay for one building.
    ///
    /// Fails only on invalid input, upstream perimeter failure, or an oracle
    /// that cannot be reached for the first detection. Every other problem
    /// degrades the result and is reflected in its score and review flag.
    pub async fn run(&self, request: &OverlayRequest) -> Result<OverlayResult> {
        let config = &self.config;
        if !request.center.is_finite() {
            return Err(Error::InvalidRequest("lat/lng must be finite numbers".into()));
        }

        let (perimeter, footprint) = resolve_perimeter(
            self.perimeter_source.as_ref(),
            request.address.as_deref(),
            request.center,
        )
        .await?;

        let projector = Projector::new(request.center, config.zoom, config.image_size_px)?;
        let scene = SceneContext {
            projector,
            perimeter: perimeter.clone(),
            image_url: request.image_url.clone(),
            base_image: request.base_image.clone(),
            roof_type: footprint.roof_type.clone(),
        };

        let bias = load_bias(
            self.corrections.as_ref(),
            request.tenant_id.as_deref(),
            config.correction_history_limit,
        )
        .await;

        let detected = self.detector.detect(&scene, None).await?;
        let corrected = bias.apply(&detected);
        let snapped = snap_features(&corrected, &perimeter, config.snap_tolerance_ft);

        let floating = find_floating(&snapped, &perimeter, config.validation_tolerance_ft());
        let connected = if floating.is_empty() {
            snapped
        } else {
            let retry = feedback_retry(
                self.detector.as_ref(),
                &scene,
                &snapped,
                &floating,
                &bias,
                config.snap_tolerance_ft,
                config.merge_tolerance_ft(),
            )
            .await;
            snap_features(&retry.features, &perimeter, config.snap_tolerance_ft)
        };

        let refined = refine_alignment(
            self.verifier.as_ref(),
            &scene,
            &connected,
            config.max_alignment_attempts,
            config.min_alignment_score,
        )
        .await;

        let resnapped = snap_features(&refined.features, &perimeter, config.snap_tolerance_ft);
        let still_floating = find_floating(&resnapped, &perimeter, config.validation_tolerance_ft());
        let final_features = flag_floating(&resnapped, &still_floating);

        let quality = assess_quality(&final_features, config);

        let mut data_sources_priority = vec!["building_footprint".to_string(), "vision_oracle".to_string()];
        if !bias.is_zero() {
            data_sources_priority.push("tenant_corrections".to_string());
        }

        let roof_type = footprint
            .roof_type
            .clone()
            .unwrap_or_else(|| infer_roof_type(&final_features).to_string());

        tracing::info!(
            ridges = final_features.ridges.len(),
            hips = final_features.hips.len(),
            valleys = final_features.valleys.len(),
            initial_floating = floating.len(),
            final_floating = still_floating.len(),
            alignment_attempts = refined.attempts,
            quality_score = quality.quality_score,
            requires_manual_review = quality.requires_manual_review,
            "Roof overlay generated"
        );

        let DetectedFeatureSet {
            ridges,
            hips,
            valleys,
        } = final_features;

        Ok(OverlayResult {
            metadata: OverlayMetadata {
                roof_type,
                quality_score: quality.quality_score,
                data_sources_priority,
                requires_manual_review: quality.requires_manual_review,
                total_area_sqft: footprint.area_sqft.or_else(|| Some(perimeter.area_sqft())),
                processed_at: OffsetDateTime::now_utc(),
                alignment_attempts: refined.attempts,
            },
            perimeter,
            ridges,
            hips,
            valleys,
        })
    }
}

/// Rough roof classification from the detected lines, used when the
/// perimeter source does not supply one.
pub fn infer_roof_type(features: &DetectedFeatureSet) -> &'static str {
    match (
        features.ridges.is_empty(),
        features.hips.is_empty(),
        features.valleys.is_empty(),
    ) {
        (true, true, true) => "unknown",
        (_, false, false) => "cross_hip",
        (_, false, true) => "hip",
        (false, true, false) => "cross_gable",
        (false, true, true) => "gable",
        (true, true, false) => "complex",
    }
}
