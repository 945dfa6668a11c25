// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tunables for the reconstruction pipeline.

use serde::{Deserialize, Serialize};

/// Configuration for snapping, validation and refinement.
///
/// The three distance tolerances are independent: snapping uses
/// `snap_tolerance_ft`, the connectivity re-check scales it by
/// `validation_tolerance_multiplier`, and retry merging scales it by
/// `merge_tolerance_multiplier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum distance (feet) at which an endpoint snaps to a target
    pub snap_tolerance_ft: f64,
    /// Connectivity re-check tolerance, as a multiple of the snap tolerance
    pub validation_tolerance_multiplier: f64,
    /// Retry-merge overlap tolerance, as a multiple of the snap tolerance
    pub merge_tolerance_multiplier: f64,
    /// Web-Mercator tile zoom of the source image
    pub zoom: u8,
    /// Side length of the (square) source image in pixels
    pub image_size_px: u32,
    /// Hard cap on verification calls in the refinement loop
    pub max_alignment_attempts: u32,
    /// Aggregate alignment score at which refinement stops
    pub min_alignment_score: f64,
    /// Number of recent correction records used to compute tenant bias
    pub correction_history_limit: usize,
    /// Lines detected below this confidence are flagged for review
    pub review_confidence_threshold: f64,
    /// Mean confidence below this forces manual review
    pub manual_review_mean_confidence: f64,
    /// Quality score reported when no lines were detected
    pub zero_line_quality_score: f64,
}

impl PipelineConfig {
    #[inline]
    pub fn validation_tolerance_ft(&self) -> f64 {
        self.snap_tolerance_ft * self.validation_tolerance_multiplier
    }

    #[inline]
    pub fn merge_tolerance_ft(&self) -> f64 {
        self.snap_tolerance_ft * self.merge_tolerance_multiplier
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_ft: 3.0,
            validation_tolerance_multiplier: 1.5,
            merge_tolerance_multiplier: 2.0,
            zoom: 20,
            image_size_px: 640,
            max_alignment_attempts: 3,
            min_alignment_score: 90.0,
            correction_history_limit: 50,
            review_confidence_threshold: 70.0,
            manual_review_mean_confidence: 70.0,
            zero_line_quality_score: 50.0,
        }
    }
}
