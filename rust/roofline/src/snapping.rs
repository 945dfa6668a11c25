// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endpoint snapping.
//!
//! Resolves every line endpoint to the nearest valid topological target
//! within a tolerance. The target pool grows role by role:
//!
//! 1. seeded with the perimeter corners
//! 2. ridges snap, then their endpoints join the pool
//! 3. hips snap, then their endpoints join the pool
//! 4. valleys snap
//!
//! Hips terminate at ridge ends and valleys may terminate at hip/ridge
//! junctions, so this order is a precedence constraint rather than a search.

use crate::perimeter::Perimeter;
use crate::types::{DetectedFeatureSet, Endpoint, GeoPoint, LineRole};

/// Identifies one endpoint of one line.
pub type EndpointRef = (LineRole, usize, Endpoint);

/// A snap target and the line endpoint it came from, if any.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target {
    pub point: GeoPoint,
    pub owner: Option<EndpointRef>,
}

/// Ordered pool of snap targets. Insertion order breaks distance ties.
#[derive(Debug, Clone, Default)]
pub(crate) struct TargetPool {
    targets: Vec<Target>,
}

impl TargetPool {
    pub fn from_perimeter(perimeter: &Perimeter) -> Self {
        Self {
            targets: perimeter
                .vertices()
                .iter()
                .map(|&point| Target { point, owner: None })
                .collect(),
        }
    }

    pub fn add_role(&mut self, features: &DetectedFeatureSet, role: LineRole) {
        for (i, line) in features.lines(role).iter().enumerate() {
            for endpoint in [Endpoint::Start, Endpoint::End] {
                self.targets.push(Target {
                    point: line.point(endpoint),
                    owner: Some((role, i, endpoint)),
                });
            }
        }
    }

    /// Nearest target to `p`, skipping targets owned by line `(role, index)`.
    /// Earliest inserted wins exact ties.
    pub fn nearest(&self, p: &GeoPoint, exclude: Option<(LineRole, usize)>) -> Option<(Target, f64)> {
        let mut best: Option<(Target, f64)> = None;
        for target in &self.targets {
            if let (Some((role, index)), Some((owner_role, owner_index, _))) = (exclude, target.owner) {
                if role == owner_role && index == owner_index {
                    continue;
                }
            }
            let d = p.distance_ft(&target.point);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((*target, d));
            }
        }
        best
    }

    /// Owners of every pooled endpoint within `radius_ft` of `p`.
    pub fn owners_near<'a>(
        &'a self,
        p: &'a GeoPoint,
        radius_ft: f64,
    ) -> impl Iterator<Item = EndpointRef> + 'a {
        self.targets
            .iter()
            .filter(move |t| p.distance_ft(&t.point) < radius_ft)
            .filter_map(|t| t.owner)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

/// Snaps every endpoint of `features` and returns the snapped copy.
///
/// An endpoint closer than `tolerance_ft` to a target takes that target's
/// exact coordinate and is marked snapped; otherwise it is left in place and
/// marked unsnapped. When a later endpoint snaps onto a target, every
/// earlier-role endpoint within tolerance of that target is marked snapped
/// too, since they now meet at one junction.
pub fn snap_features(
    features: &DetectedFeatureSet,
    perimeter: &Perimeter,
    tolerance_ft: f64,
) -> DetectedFeatureSet {
    let mut out = features.clone();
    let mut pool = TargetPool::from_perimeter(perimeter);
    let mut junctions: Vec<EndpointRef> = Vec::new();

    for role in LineRole::ALL {
        for line in out.lines_mut(role).iter_mut() {
            for endpoint in [Endpoint::Start, Endpoint::End] {
                let p = line.point(endpoint);
                match pool.nearest(&p, None) {
                    Some((target, d)) if d < tolerance_ft => {
                        line.set_point(endpoint, target.point);
                        line.set_snapped(endpoint, true);
                        junctions.extend(pool.owners_near(&target.point, tolerance_ft));
                    }
                    _ => line.set_snapped(endpoint, false),
                }
            }
        }
        pool.add_role(&out, role);
    }

    for (role, index, endpoint) in junctions {
        if let Some(line) = out.lines_mut(role).get_mut(index) {
            line.set_snapped(endpoint, true);
        }
    }

    tracing::debug!(
        targets = pool.len(),
        lines = out.total_lines(),
        fully_snapped = out.iter().filter(|(_, _, l)| l.snapped()).count(),
        "Snapped endpoints"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineSource, RoofLine};
    use nalgebra::Vector2;

    fn origin() -> GeoPoint {
        GeoPoint::new(-97.7431, 30.2672)
    }

    fn at(x: f64, y: f64) -> GeoPoint {
        GeoPoint::from_local_feet(&origin(), &Vector2::new(x, y))
    }

    fn line(a: GeoPoint, b: GeoPoint) -> RoofLine {
        RoofLine::new(a, b, 90.0, LineSource::Oracle)
    }

    fn square() -> Perimeter {
        Perimeter::from_footprint(&[at(-20.0, -20.0), at(20.0, -20.0), at(20.0, 20.0), at(-20.0, 20.0)])
            .unwrap()
    }

    #[test]
    fn test_hip_snaps_to_corner_and_ridge_end() {
        let mut features = DetectedFeatureSet::new();
        features.ridges.push(line(at(-8.0, 0.0), at(8.0, 0.0)));
        features.hips.push(line(at(-7.0, 1.0), at(-19.0, -18.5)));

        let snapped = snap_features(&features, &square(), 3.0);

        assert_eq!(snapped.hips[0].start, snapped.ridges[0].start);
        assert_eq!(snapped.hips[0].end, at(-20.0, -20.0));
        assert!(snapped.hips[0].snapped());
        // Ridge start became a junction, ridge end is still free
        assert!(snapped.ridges[0].start_snapped);
        assert!(!snapped.ridges[0].end_snapped);
    }

    #[test]
    fn test_beyond_tolerance_left_in_place() {
        let mut features = DetectedFeatureSet::new();
        features.hips.push(line(at(0.0, 0.0), at(-15.0, -15.0)));

        let snapped = snap_features(&features, &square(), 3.0);

        assert_eq!(snapped.hips[0].end, at(-15.0, -15.0));
        assert!(!snapped.hips[0].end_snapped);
        assert!(!snapped.hips[0].snapped());
    }

    #[test]
    fn test_hips_do_not_snap_to_each_other() {
        let mut features = DetectedFeatureSet::new();
        features.hips.push(line(at(0.0, 0.0), at(-20.0, -20.0)));
        features.hips.push(line(at(0.5, 0.5), at(20.0, 20.0)));

        let snapped = snap_features(&features, &square(), 3.0);

        assert!(!snapped.hips[0].start_snapped);
        assert!(!snapped.hips[1].start_snapped);
    }

    #[test]
    fn test_valley_snaps_to_hip_end() {
        let mut features = DetectedFeatureSet::new();
        features.hips.push(line(at(5.0, 5.0), at(20.0, 20.0)));
        features.valleys.push(line(at(5.5, 4.0), at(20.0, -20.0)));

        let snapped = snap_features(&features, &square(), 3.0);

        assert_eq!(snapped.valleys[0].start, snapped.hips[0].start);
        assert!(snapped.valleys[0].snapped());
    }

    #[test]
    fn test_nearest_target_wins() {
        let mut features = DetectedFeatureSet::new();
        // Ridge start is 4 ft from the corner and stays put
        features.ridges.push(line(at(-16.0, -20.0), at(0.0, 0.0)));
        // 2.5 ft from the corner, 1.5 ft from the ridge start
        features.hips.push(line(at(-17.5, -20.0), at(0.0, 10.0)));

        let snapped = snap_features(&features, &square(), 3.0);

        assert_eq!(snapped.ridges[0].start, at(-16.0, -20.0));
        assert_eq!(snapped.hips[0].start, at(-16.0, -20.0));
    }

    #[test]
    fn test_equidistant_targets_prefer_earliest() {
        let mut features = DetectedFeatureSet::new();
        // Ridge start sits exactly on the corner, so both targets share a point
        features.ridges.push(line(at(-20.0, -20.0), at(0.0, 0.0)));
        let snapped = snap_features(&features, &square(), 3.0);

        let mut pool = TargetPool::from_perimeter(&square());
        pool.add_role(&snapped, LineRole::Ridge);

        let (target, d) = pool.nearest(&at(-19.0, -19.0), None).unwrap();
        assert_eq!(target.point, snapped.ridges[0].start);
        assert!(target.owner.is_none(), "corner was inserted first");
        assert!(d < 3.0);
    }

    #[test]
    fn test_ridges_sharing_a_junction_are_both_snapped() {
        // L-shaped footprint, re-entrant corner at the origin
        let perimeter = Perimeter::from_footprint(&[
            at(-20.0, -20.0),
            at(20.0, -20.0),
            at(20.0, 0.0),
            at(0.0, 0.0),
            at(0.0, 20.0),
            at(-20.0, 20.0),
        ])
        .unwrap();

        let mut features = DetectedFeatureSet::new();
        features.ridges.push(line(at(-10.0, -10.0), at(10.0, -10.0)));
        features.ridges.push(line(at(-9.6, -10.3), at(-10.0, 10.0)));
        features.valleys.push(line(at(-9.5, -9.6), at(0.4, 0.3)));

        let snapped = snap_features(&features, &perimeter, 3.0);

        assert!(snapped.ridges[0].start_snapped);
        assert!(snapped.ridges[1].start_snapped);
        assert!(!snapped.ridges[0].end_snapped);
        assert!(!snapped.ridges[1].end_snapped);
        assert_eq!(snapped.valleys[0].start, snapped.ridges[0].start);
        assert_eq!(snapped.valleys[0].end, at(0.0, 0.0));
        assert!(snapped.valleys[0].snapped());
    }

    #[test]
    fn test_snapping_is_idempotent() {
        let mut features = DetectedFeatureSet::new();
        features.ridges.push(line(at(-8.0, 0.3), at(8.0, -0.2)));
        features.hips.push(line(at(-7.0, 1.0), at(-19.0, -18.5)));
        features.hips.push(line(at(9.0, 1.0), at(13.0, 13.0)));
        features.valleys.push(line(at(8.5, 0.0), at(19.5, -19.0)));

        let once = snap_features(&features, &square(), 3.0);
        let twice = snap_features(&once, &square(), 3.0);
        assert_eq!(once, twice);
    }
}
