// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Perimeter resolution and normalization.
//!
//! The building footprint arrives from an upstream source as a loose polygon:
//! possibly closed with a duplicate vertex, possibly clockwise, possibly with
//! repeated points. [`Perimeter::from_footprint`] turns it into the ordered,
//! counter-clockwise ring of distinct corners that snapping relies on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::GeoPoint;

/// Vertices closer than this (degrees, per axis) are treated as one.
const DUPLICATE_EPSILON_DEG: f64 = 1e-9;

/// Footprint as returned by the perimeter/area source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub polygon: Vec<GeoPoint>,
    pub roof_type: Option<String>,
    pub area_sqft: Option<f64>,
}

/// Upstream collaborator that knows building footprints.
#[async_trait]
pub trait PerimeterSource: Send + Sync {
    /// Looks up the footprint of the building at `center`.
    async fn footprint(&self, address: Option<&str>, center: GeoPoint) -> Result<Footprint>;
}

/// An ordered, closed ring of at least 3 distinct corners.
///
/// The closing vertex is not repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Perimeter {
    vertices: Vec<GeoPoint>,
}

impl Perimeter {
    /// Normalizes a raw footprint polygon into a perimeter ring.
    pub fn from_footprint(points: &[GeoPoint]) -> Result<Self> {
        let mut ring: Vec<GeoPoint> = Vec::with_capacity(points.len());
        for p in points {
            if !p.is_finite() {
                return Err(Error::NonFiniteCoordinate(p.lon, p.lat));
            }
            if ring.last().is_some_and(|last| same_vertex(last, p)) {
                continue;
            }
            ring.push(*p);
        }

        while ring.len() > 1 && same_vertex(&ring[0], &ring[ring.len() - 1]) {
            ring.pop();
        }

        let distinct = count_distinct(&ring);
        if distinct < 3 {
            return Err(Error::DegeneratePerimeter(distinct));
        }

        if signed_area_deg(&ring) < 0.0 {
            ring.reverse();
        }

        Ok(Self { vertices: ring })
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex average, used as the local frame origin.
    pub fn centroid(&self) -> GeoPoint {
        let n = self.vertices.len().max(1) as f64;
        let (lon, lat) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(lon, lat), p| (lon + p.lon, lat + p.lat));
        GeoPoint::new(lon / n, lat / n)
    }

    /// Footprint area in square feet (shoelace formula in a local feet frame).
    pub fn area_sqft(&self) -> f64 {
        let origin = self.centroid();
        let local: Vec<_> = self.vertices.iter().map(|p| p.to_local_feet(&origin)).collect();
        let n = local.len();
        if n < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += local[i].x * local[j].y;
            area -= local[j].x * local[i].y;
        }

        (area / 2.0).abs()
    }
}

/// Fetches the footprint for a building and normalizes it.
///
/// Any upstream failure, or a footprint that does not normalize, aborts the
/// request with [`Error::Upstream`].
pub async fn resolve_perimeter(
    source: &dyn PerimeterSource,
    address: Option<&str>,
    center: GeoPoint,
) -> Result<(Perimeter, Footprint)> {
    let footprint = source.footprint(address, center).await.map_err(|e| match e {
        Error::Upstream(_) => e,
        other => Error::Upstream(other.to_string()),
    })?;

    if footprint.polygon.is_empty() {
        return Err(Error::Upstream("no building footprint found".into()));
    }

    let perimeter = Perimeter::from_footprint(&footprint.polygon)
        .map_err(|e| Error::Upstream(format!("unusable footprint: {e}")))?;

    tracing::debug!(
        raw_vertices = footprint.polygon.len(),
        vertices = perimeter.len(),
        roof_type = footprint.roof_type.as_deref().unwrap_or("unknown"),
        "Resolved perimeter"
    );

    Ok((perimeter, footprint))
}

#[inline]
fn same_vertex(a: &GeoPoint, b: &GeoPoint) -> bool {
    (a.lon - b.lon).abs() < DUPLICATE_EPSILON_DEG && (a.lat - b.lat).abs() < DUPLICATE_EPSILON_DEG
}

fn count_distinct(points: &[GeoPoint]) -> usize {
    let mut seen: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.iter().any(|s| same_vertex(s, p)) {
            seen.push(*p);
        }
    }
    seen.len()
}

/// Signed shoelace area in degree space; positive for counter-clockwise.
fn signed_area_deg(points: &[GeoPoint]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].lon * points[j].lat - points[j].lon * points[i].lat;
    }
    area / 2.0
}
