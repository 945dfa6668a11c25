// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Visual alignment refinement.
//!
//! A bounded loop against the verifier:
//!
//! ```text
//! Verifying --score >= min--> Converged
//!     |  \--attempts == max--> AttemptsExhausted
//!     v
//! Adjusting --apply shifts--> Verifying
//! ```
//!
//! Each verification replaces the per-line confidences with the verifier's
//! scores; the aggregate is their mean. On exhaustion the last verified
//! feature set is kept as is, without applying the final suggestions.

use serde::{Deserialize, Serialize};

use crate::oracle::{AlignmentVerifier, SceneContext};
use crate::types::{AlignmentAdjustment, DetectedFeatureSet, LineRole};

/// Aggregate score used when there are no lines to score.
pub const NEUTRAL_ALIGNMENT_SCORE: f64 = 50.0;

/// Verifier score for one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineScore {
    pub role: LineRole,
    pub index: usize,
    pub score: f64,
}

/// One verification answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub scores: Vec<LineScore>,
    pub adjustments: Vec<AlignmentAdjustment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentState {
    Verifying,
    Adjusting,
    Converged,
    AttemptsExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementOutcome {
    pub features: DetectedFeatureSet,
    /// Verification calls made
    pub attempts: u32,
    pub final_score: f64,
    /// Terminal state: `Converged` or `AttemptsExhausted`
    pub state: AlignmentState,
}

/// Mean confidence over all lines, or the neutral score for none.
pub fn aggregate_score(features: &DetectedFeatureSet) -> f64 {
    let total = features.total_lines();
    if total == 0 {
        return NEUTRAL_ALIGNMENT_SCORE;
    }
    features.iter().map(|(_, _, l)| l.confidence).sum::<f64>() / total as f64
}

/// Copies `features` with each scored line's confidence set to its score.
///
/// Review flags are left alone: they record the detection pass, where a low
/// confidence and an explicit oracle flag are indistinguishable afterwards.
pub fn apply_scores(features: &DetectedFeatureSet, scores: &[LineScore]) -> DetectedFeatureSet {
    let mut out = features.clone();
    for s in scores {
        if let Some(line) = out.lines_mut(s.role).get_mut(s.index) {
            line.confidence = s.score.clamp(0.0, 100.0);
        }
    }
    out
}

/// Copies `features` with each adjustment's shift added to both endpoints of
/// the referenced line. Adjustments for unknown lines are ignored.
pub fn apply_adjustments(
    features: &DetectedFeatureSet,
    adjustments: &[AlignmentAdjustment],
) -> DetectedFeatureSet {
    let mut out = features.clone();
    for adj in adjustments {
        let Some(line) = out.lines_mut(adj.role).get_mut(adj.index) else {
            tracing::debug!(role = adj.role.as_str(), index = adj.index, "Adjustment for unknown line");
            continue;
        };
        let lat = (line.start.lat + line.end.lat) / 2.0;
        let (dlon, dlat) = adj.direction.to_degrees(adj.distance_ft, lat);
        line.translate(dlon, dlat);
    }
    out
}

/// Runs the refinement loop, making at most `max_attempts` verifier calls.
///
/// A verifier error consumes the attempt and leaves scores untouched.
pub async fn refine_alignment(
    verifier: &dyn AlignmentVerifier,
    scene: &SceneContext,
    features: &DetectedFeatureSet,
    max_attempts: u32,
    min_score: f64,
) -> RefinementOutcome {
    let mut current = features.clone();
    let mut state = AlignmentState::Verifying;
    let mut attempts = 0u32;
    let mut score = aggregate_score(&current);
    let mut pending: Vec<AlignmentAdjustment> = Vec::new();

    loop {
        match state {
            AlignmentState::Verifying => {
                if attempts >= max_attempts {
                    state = AlignmentState::AttemptsExhausted;
                    continue;
                }
                attempts += 1;

                let report = verifier.verify(scene, &current).await.unwrap_or_else(|e| {
                    tracing::warn!(attempt = attempts, error = %e, "Alignment verification failed");
                    AlignmentReport::default()
                });

                current = apply_scores(&current, &report.scores);
                score = aggregate_score(&current);
                tracing::debug!(
                    attempt = attempts,
                    score,
                    adjustments = report.adjustments.len(),
                    "Alignment verified"
                );

                state = if score >= min_score {
                    AlignmentState::Converged
                } else if attempts < max_attempts {
                    pending = report.adjustments;
                    AlignmentState::Adjusting
                } else {
                    AlignmentState::AttemptsExhausted
                };
            }
            AlignmentState::Adjusting => {
                current = apply_adjustments(&current, &pending);
                pending.clear();
                state = AlignmentState::Verifying;
            }
            AlignmentState::Converged | AlignmentState::AttemptsExhausted => break,
        }
    }

    if state == AlignmentState::AttemptsExhausted {
        tracing::info!(attempts, score, "Alignment did not converge");
    }

    RefinementOutcome {
        features: current,
        attempts,
        final_score: score,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, GeoPoint, LineSource, RoofLine};
    use approx::assert_relative_eq;

    fn features() -> DetectedFeatureSet {
        let mut f = DetectedFeatureSet::new();
        f.ridges.push(RoofLine::new(
            GeoPoint::new(-97.7431, 30.2672),
            GeoPoint::new(-97.7430, 30.2672),
            60.0,
            LineSource::Oracle,
        ));
        f.hips.push(RoofLine::new(
            GeoPoint::new(-97.7431, 30.2672),
            GeoPoint::new(-97.7432, 30.2671),
            80.0,
            LineSource::Oracle,
        ));
        f
    }

    #[test]
    fn test_aggregate_score() {
        assert_relative_eq!(aggregate_score(&features()), 70.0);
        assert_relative_eq!(aggregate_score(&DetectedFeatureSet::new()), NEUTRAL_ALIGNMENT_SCORE);
    }

    #[test]
    fn test_apply_scores_ignores_unknown_lines() {
        let scored = apply_scores(
            &features(),
            &[
                LineScore { role: LineRole::Ridge, index: 0, score: 95.0 },
                LineScore { role: LineRole::Valley, index: 4, score: 10.0 },
            ],
        );
        assert_eq!(scored.ridges[0].confidence, 95.0);
        assert_eq!(scored.hips[0].confidence, 80.0);
    }

    #[test]
    fn test_apply_scores_keeps_detection_review_flag() {
        let mut flagged = features();
        flagged.ridges[0].requires_review = true;

        let scored = apply_scores(
            &flagged,
            &[LineScore { role: LineRole::Ridge, index: 0, score: 98.0 }],
        );
        assert_eq!(scored.ridges[0].confidence, 98.0);
        assert!(scored.ridges[0].requires_review);
        assert!(!scored.hips[0].requires_review);
    }

    #[test]
    fn test_adjustment_moves_both_endpoints() {
        let before = features();
        let after = apply_adjustments(
            &before,
            &[AlignmentAdjustment {
                role: LineRole::Hip,
                index: 0,
                direction: Direction::Up,
                distance_ft: 2.0,
            }],
        );
        let moved = &after.hips[0];
        let orig = &before.hips[0];
        assert_relative_eq!(orig.start.distance_ft(&moved.start), 2.0, epsilon = 1e-6);
        assert_relative_eq!(orig.end.distance_ft(&moved.end), 2.0, epsilon = 1e-6);
        assert!(moved.start.lat > orig.start.lat);
        assert_eq!(after.ridges, before.ridges);
    }
}
