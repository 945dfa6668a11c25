// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feedback retry for floating endpoints.
//!
//! When validation finds floating endpoints the detector is asked exactly
//! once more, with those coordinates embedded in the prompt. The retry answer
//! is merged back by spatial overlap. The merge is best-effort; whatever it
//! leaves unresolved is flagged downstream.

use crate::connectivity::{floating_points, FloatingEndpoint};
use crate::correction::CorrectionBias;
use crate::oracle::{FeatureDetector, SceneContext};
use crate::snapping::snap_features;
use crate::types::{DetectedFeatureSet, LineRole};

/// What the retry did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryOutcome {
    pub features: DetectedFeatureSet,
    /// The detector was invoked
    pub attempted: bool,
    /// Original lines replaced by a better-snapped retry line
    pub replaced: usize,
    /// Retry lines added because they overlapped nothing
    pub appended: usize,
}

/// Merges `retry` into `current`.
///
/// For each retry line: if it overlaps an original line (both endpoints
/// within `tolerance_ft`) and is fully snapped while that original is not,
/// it replaces the original. Each original is replaced at most once. A retry
/// line overlapping nothing, including lines appended earlier in this merge,
/// is appended.
pub fn merge_retry(
    current: &DetectedFeatureSet,
    retry: &DetectedFeatureSet,
    tolerance_ft: f64,
) -> (DetectedFeatureSet, usize, usize) {
    let mut out = current.clone();
    let mut replaced_total = 0;
    let mut appended_total = 0;

    for role in LineRole::ALL {
        let originals = current.lines(role);
        let mut replaced = vec![false; originals.len()];

        for candidate in retry.lines(role) {
            match originals.iter().position(|o| candidate.overlaps(o, tolerance_ft)) {
                Some(i) => {
                    if !replaced[i] && candidate.snapped() && !originals[i].snapped() {
                        out.lines_mut(role)[i] = candidate.clone();
                        replaced[i] = true;
                        replaced_total += 1;
                    }
                }
                None => {
                    let lines = out.lines_mut(role);
                    if !lines.iter().any(|l| candidate.overlaps(l, tolerance_ft)) {
                        lines.push(candidate.clone());
                        appended_total += 1;
                    }
                }
            }
        }
    }

    (out, replaced_total, appended_total)
}

/// Runs the single feedback retry pass.
///
/// `current` must already be snapped. The returned feature set still needs a
/// snapping pass, since appended lines may create new junctions.
pub async fn feedback_retry(
    detector: &dyn FeatureDetector,
    scene: &SceneContext,
    current: &DetectedFeatureSet,
    floating: &[FloatingEndpoint],
    bias: &CorrectionBias,
    snap_tolerance_ft: f64,
    merge_tolerance_ft: f64,
) -> RetryOutcome {
    if floating.is_empty() {
        return RetryOutcome {
            features: current.clone(),
            ..Default::default()
        };
    }

    let points = floating_points(floating);
    let retry = match detector.detect(scene, Some(&points)).await {
        Ok(features) => features,
        Err(e) => {
            tracing::warn!(error = %e, "Feedback retry failed, keeping first pass");
            return RetryOutcome {
                features: current.clone(),
                attempted: true,
                ..Default::default()
            };
        }
    };

    let retry = snap_features(&bias.apply(&retry), &scene.perimeter, snap_tolerance_ft);
    let (features, replaced, appended) = merge_retry(current, &retry, merge_tolerance_ft);

    tracing::info!(
        floating = floating.len(),
        retry_lines = retry.total_lines(),
        replaced,
        appended,
        "Feedback retry merged"
    );

    RetryOutcome {
        features,
        attempted: true,
        replaced,
        appended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoPoint, LineSource, RoofLine};
    use nalgebra::Vector2;

    fn at(x: f64, y: f64) -> GeoPoint {
        GeoPoint::from_local_feet(&GeoPoint::new(-97.7431, 30.2672), &Vector2::new(x, y))
    }

    fn line(a: GeoPoint, b: GeoPoint, snapped: bool, source: LineSource) -> RoofLine {
        let mut l = RoofLine::new(a, b, 80.0, source);
        l.start_snapped = snapped;
        l.end_snapped = snapped;
        l
    }

    #[test]
    fn test_snapped_retry_replaces_unsnapped_original() {
        let mut current = DetectedFeatureSet::new();
        current
            .hips
            .push(line(at(-8.0, 0.0), at(-15.0, -15.0), false, LineSource::Oracle));

        let mut retry = DetectedFeatureSet::new();
        retry
            .hips
            .push(line(at(-8.5, 0.5), at(-14.0, -15.5), true, LineSource::OracleRetry));

        let (merged, replaced, appended) = merge_retry(&current, &retry, 6.0);
        assert_eq!((replaced, appended), (1, 0));
        assert_eq!(merged.hips.len(), 1);
        assert_eq!(merged.hips[0].source, LineSource::OracleRetry);
    }

    #[test]
    fn test_original_replaced_at_most_once() {
        let mut current = DetectedFeatureSet::new();
        current
            .hips
            .push(line(at(-8.0, 0.0), at(-15.0, -15.0), false, LineSource::Oracle));

        let mut retry = DetectedFeatureSet::new();
        for dx in [0.5, 1.0, 1.5] {
            retry.hips.push(line(
                at(-8.0 + dx, 0.0),
                at(-15.0 + dx, -15.0),
                true,
                LineSource::OracleRetry,
            ));
        }

        let (merged, replaced, appended) = merge_retry(&current, &retry, 6.0);
        assert_eq!((replaced, appended), (1, 0));
        assert_eq!(merged.hips.len(), 1);
        assert_eq!(merged.hips[0].start, at(-7.5, 0.0));
    }

    #[test]
    fn test_unsnapped_retry_does_not_replace() {
        let mut current = DetectedFeatureSet::new();
        current
            .hips
            .push(line(at(-8.0, 0.0), at(-15.0, -15.0), false, LineSource::Oracle));
        let mut retry = DetectedFeatureSet::new();
        retry
            .hips
            .push(line(at(-8.0, 0.0), at(-15.0, -15.0), false, LineSource::OracleRetry));

        let (merged, replaced, appended) = merge_retry(&current, &retry, 6.0);
        assert_eq!((replaced, appended), (0, 0));
        assert_eq!(merged.hips[0].source, LineSource::Oracle);
    }

    #[test]
    fn test_new_lines_appended_once() {
        let current = DetectedFeatureSet::new();
        let mut retry = DetectedFeatureSet::new();
        let valley = line(at(0.0, 0.0), at(20.0, 20.0), true, LineSource::OracleRetry);
        retry.valleys.push(valley.clone());
        retry.valleys.push(valley);

        let (merged, _, appended) = merge_retry(&current, &retry, 6.0);
        assert_eq!(appended, 1);
        assert_eq!(merged.valleys.len(), 1);
    }
}
