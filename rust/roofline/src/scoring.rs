// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Quality score and manual-review decision.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::types::DetectedFeatureSet;

/// Penalty (points) when every line requires review.
const REVIEW_PENALTY: f64 = 20.0;
/// Bonus (points) when every line is fully snapped.
const SNAP_BONUS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0-100
    pub quality_score: f64,
    pub requires_manual_review: bool,
    pub mean_confidence: f64,
}

/// Scores a final feature set.
///
/// `quality = clamp(mean_confidence - 20 * review_ratio + 10 * snapped_ratio, 0, 100)`.
/// With no lines the score is `config.zero_line_quality_score` and review is
/// always required.
pub fn assess_quality(features: &DetectedFeatureSet, config: &PipelineConfig) -> QualityAssessment {
    let total = features.total_lines();
    if total == 0 {
        return QualityAssessment {
            quality_score: config.zero_line_quality_score,
            requires_manual_review: true,
            mean_confidence: 0.0,
        };
    }

    let n = total as f64;
    let mut confidence_sum = 0.0;
    let mut needs_review = 0usize;
    let mut fully_snapped = 0usize;
    for (_, _, line) in features.iter() {
        confidence_sum += line.confidence;
        if line.requires_review {
            needs_review += 1;
        }
        if line.snapped() {
            fully_snapped += 1;
        }
    }

    let mean_confidence = confidence_sum / n;
    let review_penalty = REVIEW_PENALTY * (needs_review as f64 / n);
    let snap_bonus = SNAP_BONUS * (fully_snapped as f64 / n);
    let quality_score = (mean_confidence - review_penalty + snap_bonus).clamp(0.0, 100.0);

    let requires_manual_review = needs_review > 0
        || features.ridges.is_empty()
        || fully_snapped < total
        || mean_confidence < config.manual_review_mean_confidence;

    QualityAssessment {
        quality_score,
        requires_manual_review,
        mean_confidence,
    }
}
