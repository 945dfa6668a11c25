// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connectivity validation.
//!
//! An independent re-check after snapping. Every hip and valley endpoint must
//! lie near a perimeter corner, a ridge endpoint, or an endpoint of another
//! hip. Ridges are not checked; they are grounded by the snapping order.
//!
//! Run with a tolerance somewhat larger than the snap tolerance so that
//! projection drift never flags an endpoint snapping already resolved.

use serde::{Deserialize, Serialize};

use crate::perimeter::Perimeter;
use crate::snapping::TargetPool;
use crate::types::{DetectedFeatureSet, Endpoint, GeoPoint, LineRole};

/// An endpoint with no valid target within tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatingEndpoint {
    pub role: LineRole,
    pub index: usize,
    pub endpoint: Endpoint,
    pub point: GeoPoint,
}

/// Returns every floating hip/valley endpoint; empty means fully connected.
pub fn find_floating(
    features: &DetectedFeatureSet,
    perimeter: &Perimeter,
    tolerance_ft: f64,
) -> Vec<FloatingEndpoint> {
    let mut pool = TargetPool::from_perimeter(perimeter);
    pool.add_role(features, LineRole::Ridge);
    pool.add_role(features, LineRole::Hip);

    let mut floating = Vec::new();
    for role in [LineRole::Hip, LineRole::Valley] {
        for (index, line) in features.lines(role).iter().enumerate() {
            for endpoint in [Endpoint::Start, Endpoint::End] {
                let point = line.point(endpoint);
                let connected = pool
                    .nearest(&point, Some((role, index)))
                    .is_some_and(|(_, d)| d <= tolerance_ft);
                if !connected {
                    floating.push(FloatingEndpoint {
                        role,
                        index,
                        endpoint,
                        point,
                    });
                }
            }
        }
    }

    if !floating.is_empty() {
        tracing::debug!(count = floating.len(), "Floating endpoints found");
    }
    floating
}

/// Returns a copy of `features` with every line owning a floating endpoint
/// flagged for review.
pub fn flag_floating(
    features: &DetectedFeatureSet,
    floating: &[FloatingEndpoint],
) -> DetectedFeatureSet {
    let mut out = features.clone();
    for f in floating {
        if let Some(line) = out.lines_mut(f.role).get_mut(f.index) {
            line.requires_review = true;
        }
    }
    out
}

/// Floating points only, for prompt feedback.
pub fn floating_points(floating: &[FloatingEndpoint]) -> Vec<GeoPoint> {
    floating.iter().map(|f| f.point).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapping::snap_features;
    use crate::types::{LineSource, RoofLine};
    use nalgebra::Vector2;

    fn at(x: f64, y: f64) -> GeoPoint {
        GeoPoint::from_local_feet(&GeoPoint::new(-97.7431, 30.2672), &Vector2::new(x, y))
    }

    fn line(a: GeoPoint, b: GeoPoint) -> RoofLine {
        RoofLine::new(a, b, 90.0, LineSource::Oracle)
    }

    fn square() -> Perimeter {
        Perimeter::from_footprint(&[at(-20.0, -20.0), at(20.0, -20.0), at(20.0, 20.0), at(-20.0, 20.0)])
            .unwrap()
    }

    #[test]
    fn test_connected_hip_roof() {
        let mut features = DetectedFeatureSet::new();
        features.ridges.push(line(at(-8.0, 0.0), at(8.0, 0.0)));
        features.hips.push(line(at(-8.0, 0.0), at(-20.0, -20.0)));
        features.hips.push(line(at(-8.0, 0.0), at(-20.0, 20.0)));
        features.hips.push(line(at(8.0, 0.0), at(20.0, -20.0)));
        features.hips.push(line(at(8.0, 0.0), at(20.0, 20.0)));

        assert!(find_floating(&features, &square(), 4.5).is_empty());
    }

    #[test]
    fn test_own_endpoints_do_not_count() {
        let mut features = DetectedFeatureSet::new();
        // Short hip whose endpoints are within tolerance of each other only
        features.hips.push(line(at(0.0, 0.0), at(1.0, 0.0)));

        let floating = find_floating(&features, &square(), 4.5);
        assert_eq!(floating.len(), 2);
    }

    #[test]
    fn test_flags_far_endpoint() {
        let mut features = DetectedFeatureSet::new();
        features.ridges.push(line(at(-8.0, 0.0), at(8.0, 0.0)));
        features.hips.push(line(at(-8.0, 0.0), at(-9.4, -9.4)));

        let floating = find_floating(&features, &square(), 4.5);
        assert_eq!(floating.len(), 1);
        assert_eq!(floating[0].endpoint, Endpoint::End);

        let flagged = flag_floating(&features, &floating);
        assert!(flagged.hips[0].requires_review);
        assert!(!flagged.ridges[0].requires_review);
    }

    #[test]
    fn test_snapped_output_never_flagged() {
        let mut features = DetectedFeatureSet::new();
        features.ridges.push(line(at(-8.0, 0.4), at(8.0, -0.3)));
        features.hips.push(line(at(-6.0, 1.5), at(-18.2, -19.0)));
        features.valleys.push(line(at(9.9, 0.5), at(19.0, 18.0)));

        let snapped = snap_features(&features, &square(), 3.0);
        assert!(find_floating(&snapped, &square(), 4.5).is_empty());
    }
}
