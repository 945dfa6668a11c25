// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for roof-line reconstruction

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::perimeter::Perimeter;

/// Meters spanned by one degree of latitude (spherical approximation).
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Feet per meter.
pub const FEET_PER_METER: f64 = 3.280_84;

/// A (longitude, latitude) pair in decimal degrees.
///
/// Serializes as a `[lng, lat]` array, matching GeoJSON position order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// Offset of `self` from `origin` in a local east/north frame, in feet.
    ///
    /// Equirectangular approximation around the origin's latitude, which is
    /// exact enough at building scale.
    pub fn to_local_feet(&self, origin: &GeoPoint) -> Vector2<f64> {
        let feet_per_deg_lat = METERS_PER_DEGREE_LAT * FEET_PER_METER;
        let feet_per_deg_lon = feet_per_deg_lat * origin.lat.to_radians().cos();
        Vector2::new(
            (self.lon - origin.lon) * feet_per_deg_lon,
            (self.lat - origin.lat) * feet_per_deg_lat,
        )
    }

    /// Inverse of [`GeoPoint::to_local_feet`].
    pub fn from_local_feet(origin: &GeoPoint, offset: &Vector2<f64>) -> Self {
        let feet_per_deg_lat = METERS_PER_DEGREE_LAT * FEET_PER_METER;
        let feet_per_deg_lon = feet_per_deg_lat * origin.lat.to_radians().cos();
        Self {
            lon: origin.lon + offset.x / feet_per_deg_lon,
            lat: origin.lat + offset.y / feet_per_deg_lat,
        }
    }

    /// Ground distance to `other` in feet.
    pub fn distance_ft(&self, other: &GeoPoint) -> f64 {
        other.to_local_feet(self).norm()
    }

    /// Returns this point shifted by a degree delta.
    #[inline]
    pub fn offset(&self, delta_lon: f64, delta_lat: f64) -> Self {
        Self {
            lon: self.lon + delta_lon,
            lat: self.lat + delta_lat,
        }
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(p: GeoPoint) -> Self {
        [p.lon, p.lat]
    }
}

/// Structural role of a roof line.
///
/// Declaration order is the snapping precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineRole {
    Ridge,
    Hip,
    Valley,
}

impl LineRole {
    /// All roles in snapping precedence order.
    pub const ALL: [LineRole; 3] = [LineRole::Ridge, LineRole::Hip, LineRole::Valley];

    pub fn as_str(&self) -> &'static str {
        match self {
            LineRole::Ridge => "ridge",
            LineRole::Hip => "hip",
            LineRole::Valley => "valley",
        }
    }

    /// Parses singular or plural role names, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ridge" | "ridges" => Some(LineRole::Ridge),
            "hip" | "hips" => Some(LineRole::Hip),
            "valley" | "valleys" => Some(LineRole::Valley),
            _ => None,
        }
    }
}

/// Where a roof line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// First detection pass.
    Oracle,
    /// First detection pass, shifted by learned tenant bias.
    OracleCorrected,
    /// Merged in from the connectivity feedback retry.
    OracleRetry,
}

impl LineSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineSource::Oracle => "oracle",
            LineSource::OracleCorrected => "oracle_corrected",
            LineSource::OracleRetry => "oracle_retry",
        }
    }
}

/// One end of a line segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Start,
    End,
}

/// A ridge, hip or valley segment in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoofLine {
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Detection (or latest alignment) confidence, 0-100
    pub confidence: f64,
    pub requires_review: bool,
    pub source: LineSource,
    /// Start resolved to a topological target
    pub start_snapped: bool,
    /// End resolved to a topological target
    pub end_snapped: bool,
    /// Free-text justification from the oracle
    pub evidence_note: Option<String>,
}

impl RoofLine {
    pub fn new(start: GeoPoint, end: GeoPoint, confidence: f64, source: LineSource) -> Self {
        Self {
            start,
            end,
            confidence: confidence.clamp(0.0, 100.0),
            requires_review: false,
            source,
            start_snapped: false,
            end_snapped: false,
            evidence_note: None,
        }
    }

    pub fn with_evidence(mut self, note: impl Into<String>) -> Self {
        self.evidence_note = Some(note.into());
        self
    }

    /// True only when both endpoints snapped.
    #[inline]
    pub fn snapped(&self) -> bool {
        self.start_snapped && self.end_snapped
    }

    #[inline]
    pub fn point(&self, endpoint: Endpoint) -> GeoPoint {
        match endpoint {
            Endpoint::Start => self.start,
            Endpoint::End => self.end,
        }
    }

    pub fn set_point(&mut self, endpoint: Endpoint, point: GeoPoint) {
        match endpoint {
            Endpoint::Start => self.start = point,
            Endpoint::End => self.end = point,
        }
    }

    pub fn set_snapped(&mut self, endpoint: Endpoint, snapped: bool) {
        match endpoint {
            Endpoint::Start => self.start_snapped = snapped,
            Endpoint::End => self.end_snapped = snapped,
        }
    }

    pub fn length_ft(&self) -> f64 {
        self.start.distance_ft(&self.end)
    }

    /// Both endpoints of `self` lie within `tolerance_ft` of the endpoints of
    /// `other`, in either orientation.
    pub fn overlaps(&self, other: &RoofLine, tolerance_ft: f64) -> bool {
        let same = self.start.distance_ft(&other.start) <= tolerance_ft
            && self.end.distance_ft(&other.end) <= tolerance_ft;
        let reversed = self.start.distance_ft(&other.end) <= tolerance_ft
            && self.end.distance_ft(&other.start) <= tolerance_ft;
        same || reversed
    }

    /// Translates both endpoints by a degree delta.
    pub fn translate(&mut self, delta_lon: f64, delta_lat: f64) {
        self.start = self.start.offset(delta_lon, delta_lat);
        self.end = self.end.offset(delta_lon, delta_lat);
    }
}

/// Ridges, hips and valleys produced by one oracle invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedFeatureSet {
    pub ridges: Vec<RoofLine>,
    pub hips: Vec<RoofLine>,
    pub valleys: Vec<RoofLine>,
}

impl DetectedFeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self, role: LineRole) -> &[RoofLine] {
        match role {
            LineRole::Ridge => &self.ridges,
            LineRole::Hip => &self.hips,
            LineRole::Valley => &self.valleys,
        }
    }

    pub fn lines_mut(&mut self, role: LineRole) -> &mut Vec<RoofLine> {
        match role {
            LineRole::Ridge => &mut self.ridges,
            LineRole::Hip => &mut self.hips,
            LineRole::Valley => &mut self.valleys,
        }
    }

    pub fn total_lines(&self) -> usize {
        self.ridges.len() + self.hips.len() + self.valleys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_lines() == 0
    }

    /// Iterates `(role, index, line)` in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = (LineRole, usize, &RoofLine)> {
        LineRole::ALL.into_iter().flat_map(move |role| {
            self.lines(role)
                .iter()
                .enumerate()
                .map(move |(i, line)| (role, i, line))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoofLine> {
        self.ridges
            .iter_mut()
            .chain(self.hips.iter_mut())
            .chain(self.valleys.iter_mut())
    }
}

/// Cardinal shift direction suggested by the verifier. Up is north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "up" | "north" => Some(Direction::Up),
            "down" | "south" => Some(Direction::Down),
            "left" | "west" => Some(Direction::Left),
            "right" | "east" => Some(Direction::Right),
            _ => None,
        }
    }

    /// Converts a shift of `distance_ft` at latitude `lat` into a
    /// `(delta_lon, delta_lat)` pair in degrees.
    pub fn to_degrees(&self, distance_ft: f64, lat: f64) -> (f64, f64) {
        let meters = distance_ft / FEET_PER_METER;
        let dlat = meters / METERS_PER_DEGREE_LAT;
        let dlon = meters / (METERS_PER_DEGREE_LAT * lat.to_radians().cos());
        match self {
            Direction::Up => (0.0, dlat),
            Direction::Down => (0.0, -dlat),
            Direction::Left => (-dlon, 0.0),
            Direction::Right => (dlon, 0.0),
        }
    }
}

/// A directional shift for one line, produced by the refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentAdjustment {
    pub role: LineRole,
    pub index: usize,
    pub direction: Direction,
    pub distance_ft: f64,
}

/// Summary fields attached to an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMetadata {
    pub roof_type: String,
    pub quality_score: f64,
    pub data_sources_priority: Vec<String>,
    pub requires_manual_review: bool,
    pub total_area_sqft: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    pub alignment_attempts: u32,
}

/// Terminal output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayResult {
    pub perimeter: Perimeter,
    pub ridges: Vec<RoofLine>,
    pub hips: Vec<RoofLine>,
    pub valleys: Vec<RoofLine>,
    pub metadata: OverlayMetadata,
}

impl OverlayResult {
    /// Iterates `(role, line)` over every line in precedence order.
    pub fn lines(&self) -> impl Iterator<Item = (LineRole, &RoofLine)> {
        self.ridges
            .iter()
            .map(|l| (LineRole::Ridge, l))
            .chain(self.hips.iter().map(|l| (LineRole::Hip, l)))
            .chain(self.valleys.iter().map(|l| (LineRole::Valley, l)))
    }
}
