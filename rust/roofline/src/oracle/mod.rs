// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vision oracle adapters.
//!
//! The oracle is an external multimodal model: given an image and a prompt it
//! returns free text. Two capabilities are built on top of it:
//!
//! - [`FeatureDetector`] - candidate ridges, hips and valleys for a roof
//! - [`AlignmentVerifier`] - per-line alignment scores and shift suggestions
//!
//! The pipeline only sees these two traits, so tests can substitute
//! deterministic fakes. [`OracleFeatureDetector`] and
//! [`OracleAlignmentVerifier`] implement them over any [`VisionOracle`].

pub mod parse;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;

use crate::alignment::AlignmentReport;
use crate::error::Result;
use crate::perimeter::Perimeter;
use crate::projection::{PercentPoint, Projector};
use crate::render::{encode_png, render_overlay};
use crate::types::{DetectedFeatureSet, GeoPoint, LineSource};

pub use parse::{extract_json, parse_detection, parse_verification};
pub use prompt::{detection_prompt, verification_prompt, PromptLine};

/// Image payload handed to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleImage {
    /// Publicly fetchable image URL
    Url(String),
    /// Inline PNG bytes
    Png(Vec<u8>),
}

impl OracleImage {
    pub fn media_type(&self) -> &'static str {
        "image/png"
    }

    /// Base64 body for inline payloads; `None` for URLs.
    pub fn base64_data(&self) -> Option<String> {
        match self {
            OracleImage::Url(_) => None,
            OracleImage::Png(bytes) => Some(STANDARD.encode(bytes)),
        }
    }
}

/// Raw multimodal completion capability.
#[async_trait]
pub trait VisionOracle: Send + Sync {
    async fn complete(&self, image: &OracleImage, prompt: &str) -> Result<String>;
}

/// Everything the oracle adapters need to know about the image being analysed.
#[derive(Debug, Clone)]
pub struct SceneContext {
    pub projector: Projector,
    pub perimeter: Perimeter,
    pub image_url: String,
    /// Decoded source image, when it could be fetched; enables rendered overlays
    pub base_image: Option<Arc<RgbaImage>>,
    pub roof_type: Option<String>,
}

impl SceneContext {
    fn perimeter_percent(&self) -> Vec<PercentPoint> {
        self.perimeter
            .vertices()
            .iter()
            .filter_map(|v| self.projector.to_percent(*v).ok())
            .collect()
    }
}

/// Detects candidate roof lines.
#[async_trait]
pub trait FeatureDetector: Send + Sync {
    /// Runs one detection pass.
    ///
    /// `floating` lists endpoints a previous pass left unconnected; when
    /// present the detection is a feedback retry and lines are tagged
    /// [`LineSource::OracleRetry`].
    async fn detect(
        &self,
        scene: &SceneContext,
        floating: Option<&[GeoPoint]>,
    ) -> Result<DetectedFeatureSet>;
}

/// Scores how well each line sits on the visible roof.
#[async_trait]
pub trait AlignmentVerifier: Send + Sync {
    async fn verify(
        &self,
        scene: &SceneContext,
        features: &DetectedFeatureSet,
    ) -> Result<AlignmentReport>;
}

/// [`FeatureDetector`] backed by a [`VisionOracle`].
pub struct OracleFeatureDetector {
    oracle: Arc<dyn VisionOracle>,
    review_confidence_threshold: f64,
}

impl OracleFeatureDetector {
    pub fn new(oracle: Arc<dyn VisionOracle>, review_confidence_threshold: f64) -> Self {
        Self {
            oracle,
            review_confidence_threshold,
        }
    }
}

#[async_trait]
impl FeatureDetector for OracleFeatureDetector {
    async fn detect(
        &self,
        scene: &SceneContext,
        floating: Option<&[GeoPoint]>,
    ) -> Result<DetectedFeatureSet> {
        let floating_pct: Option<Vec<PercentPoint>> = floating.map(|points| {
            points
                .iter()
                .filter_map(|p| scene.projector.to_percent(*p).ok())
                .collect()
        });
        let prompt = detection_prompt(
            &scene.perimeter_percent(),
            scene.roof_type.as_deref(),
            floating_pct.as_deref(),
        );

        let source = if floating.is_some() {
            LineSource::OracleRetry
        } else {
            LineSource::Oracle
        };

        let text = self
            .oracle
            .complete(&OracleImage::Url(scene.image_url.clone()), &prompt)
            .await?;

        let features = parse_detection(
            &text,
            &scene.projector,
            source,
            self.review_confidence_threshold,
        );

        tracing::debug!(
            ridges = features.ridges.len(),
            hips = features.hips.len(),
            valleys = features.valleys.len(),
            retry = floating.is_some(),
            "Oracle detection parsed"
        );

        Ok(features)
    }
}

/// [`AlignmentVerifier`] backed by a [`VisionOracle`].
///
/// When the scene carries the decoded source image, the current lines are
/// drawn onto it and sent inline; otherwise the oracle gets the image URL and
/// the line coordinates in the prompt only.
pub struct OracleAlignmentVerifier {
    oracle: Arc<dyn VisionOracle>,
}

impl OracleAlignmentVerifier {
    pub fn new(oracle: Arc<dyn VisionOracle>) -> Self {
        Self { oracle }
    }

    fn prompt_lines(scene: &SceneContext, features: &DetectedFeatureSet) -> Vec<PromptLine> {
        features
            .iter()
            .filter_map(|(role, index, line)| {
                Some(PromptLine {
                    role,
                    index,
                    start: scene.projector.to_percent(line.start).ok()?,
                    end: scene.projector.to_percent(line.end).ok()?,
                })
            })
            .collect()
    }

    fn overlay_image(scene: &SceneContext, features: &DetectedFeatureSet) -> Option<OracleImage> {
        let base = scene.base_image.as_ref()?;
        let rendered = render_overlay(base, &scene.projector, &scene.perimeter, features);
        match encode_png(&rendered) {
            Ok(bytes) => Some(OracleImage::Png(bytes)),
            Err(e) => {
                tracing::warn!(error = %e, "Overlay encoding failed, verifying against URL");
                None
            }
        }
    }
}

#[async_trait]
impl AlignmentVerifier for OracleAlignmentVerifier {
    async fn verify(
        &self,
        scene: &SceneContext,
        features: &DetectedFeatureSet,
    ) -> Result<AlignmentReport> {
        let overlay = Self::overlay_image(scene, features);
        let rendered = overlay.is_some();
        let image = overlay.unwrap_or_else(|| OracleImage::Url(scene.image_url.clone()));

        let prompt = verification_prompt(&Self::prompt_lines(scene, features), rendered);
        let text = self.oracle.complete(&image, &prompt).await?;
        Ok(parse_verification(&text))
    }
}
