// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing of free-text oracle responses.
//!
//! The oracle answers in prose that embeds a JSON object, sometimes inside a
//! fenced code block. Parsing degrades per role: a malformed `hips` array
//! costs the hips, not the ridges.

use serde::Deserialize;
use serde_json::Value;

use crate::alignment::{AlignmentReport, LineScore};
use crate::error::{Error, Result};
use crate::projection::{PercentPoint, Projector};
use crate::types::{AlignmentAdjustment, DetectedFeatureSet, Direction, LineRole, LineSource, RoofLine};

/// Confidence assumed when the oracle omits one.
const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Extracts the first balanced JSON object embedded in `text` that parses.
///
/// Prose may contain stray braces ahead of the payload, so a candidate that
/// fails to parse moves the scan on to the next `{`.
pub fn extract_json(text: &str) -> Result<Value> {
    let mut last_error = Error::OracleParse("no JSON object in response".into());

    for (start, _) in text.match_indices('{') {
        let Some(len) = balanced_len(&text.as_bytes()[start..]) else {
            last_error = Error::OracleParse("unterminated JSON object".into());
            continue;
        };
        match serde_json::from_str(&text[start..start + len]) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Error::OracleParse(e.to_string()),
        }
    }

    Err(last_error)
}

/// Length of the brace-balanced object at the start of `bytes`, honoring
/// string literals and escapes.
fn balanced_len(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Object { x: f64, y: f64 },
    Pair([f64; 2]),
}

impl RawPoint {
    fn to_percent(&self) -> PercentPoint {
        match *self {
            RawPoint::Object { x, y } => PercentPoint::new(x, y),
            RawPoint::Pair([x, y]) => PercentPoint::new(x, y),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLine {
    start: RawPoint,
    end: RawPoint,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "reason", alias = "evidence", alias = "visualEvidence")]
    description: Option<String>,
    #[serde(default, rename = "requiresReview", alias = "requires_review")]
    requires_review: Option<bool>,
}

/// Parses a detection response into geographic roof lines.
///
/// Never fails: a response without JSON, or a role whose array is malformed,
/// yields no lines for the affected roles. Lines with non-finite or
/// degenerate endpoints are dropped.
pub fn parse_detection(
    text: &str,
    projector: &Projector,
    source: LineSource,
    review_confidence_threshold: f64,
) -> DetectedFeatureSet {
    let mut features = DetectedFeatureSet::new();

    let json = match extract_json(text) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "Detection response had no usable JSON");
            return features;
        }
    };

    for role in LineRole::ALL {
        let key = match role {
            LineRole::Ridge => "ridges",
            LineRole::Hip => "hips",
            LineRole::Valley => "valleys",
        };
        let Some(raw) = json.get(key) else {
            continue;
        };
        let raw_lines: Vec<RawLine> = match serde_json::from_value(raw.clone()) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(role = role.as_str(), error = %e, "Malformed role array, skipping");
                continue;
            }
        };

        let lines = features.lines_mut(role);
        for raw_line in raw_lines {
            match to_roof_line(&raw_line, projector, source, review_confidence_threshold) {
                Some(line) => lines.push(line),
                None => tracing::debug!(role = role.as_str(), "Dropped unusable line"),
            }
        }
    }

    features
}

fn to_roof_line(
    raw: &RawLine,
    projector: &Projector,
    source: LineSource,
    review_confidence_threshold: f64,
) -> Option<RoofLine> {
    let start = projector.to_geo(raw.start.to_percent()).ok()?;
    let end = projector.to_geo(raw.end.to_percent()).ok()?;
    if start == end {
        return None;
    }

    let confidence = raw
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 100.0);

    let mut line = RoofLine::new(start, end, confidence, source);
    line.requires_review =
        raw.requires_review.unwrap_or(false) || confidence < review_confidence_threshold;
    line.evidence_note = raw.description.clone().filter(|d| !d.trim().is_empty());
    Some(line)
}

#[derive(Debug, Deserialize)]
struct RawVerification {
    #[serde(default)]
    lines: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLineVerdict {
    #[serde(alias = "type", alias = "lineType")]
    role: String,
    index: usize,
    #[serde(alias = "alignmentScore", alias = "confidence")]
    score: f64,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default, rename = "distanceFt", alias = "distance_ft", alias = "distance")]
    distance_ft: Option<f64>,
}

/// Parses a verification response.
///
/// Entries that do not parse are skipped; a response with no JSON yields an
/// empty report.
pub fn parse_verification(text: &str) -> AlignmentReport {
    let mut report = AlignmentReport::default();

    let raw: RawVerification = match extract_json(text).and_then(|v| {
        serde_json::from_value(v).map_err(|e| Error::OracleParse(e.to_string()))
    }) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Verification response had no usable JSON");
            return report;
        }
    };

    for entry in raw.lines {
        let verdict: RawLineVerdict = match serde_json::from_value(entry) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed verdict");
                continue;
            }
        };
        let Some(role) = LineRole::parse(&verdict.role) else {
            continue;
        };
        if !verdict.score.is_finite() {
            continue;
        }

        report.scores.push(LineScore {
            role,
            index: verdict.index,
            score: verdict.score.clamp(0.0, 100.0),
        });

        let direction = verdict.direction.as_deref().and_then(Direction::parse);
        if let (Some(direction), Some(distance_ft)) = (direction, verdict.distance_ft) {
            if distance_ft.is_finite() && distance_ft > 0.0 {
                report.adjustments.push(AlignmentAdjustment {
                    role,
                    index: verdict.index,
                    direction,
                    distance_ft,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    fn projector() -> Projector {
        Projector::new(GeoPoint::new(-97.7431, 30.2672), 20, 640).unwrap()
    }

    #[test]
    fn test_extract_json_from_fenced_prose() {
        let text = "Here you go:\n```json\n{\"ridges\": [], \"note\": \"a } in a string\"}\n```\nDone.";
        let json = extract_json(text).unwrap();
        assert_eq!(json["note"], "a } in a string");
    }

    #[test]
    fn test_extract_json_missing() {
        assert!(matches!(extract_json("no lines visible"), Err(Error::OracleParse(_))));
        assert!(matches!(extract_json("{\"ridges\": ["), Err(Error::OracleParse(_))));
    }

    #[test]
    fn test_extract_json_skips_braces_in_prose() {
        let text = r#"Points are given as {x, y} percentages. {"ridges": [{"start": [40, 50], "end": [60, 50]}]}"#;
        let json = extract_json(text).unwrap();
        assert!(json["ridges"].is_array());

        let features = parse_detection(text, &projector(), LineSource::Oracle, 70.0);
        assert_eq!(features.ridges.len(), 1);
    }

    #[test]
    fn test_parse_detection_mixed_point_shapes() {
        let text = r#"{
            "ridges": [{"start": {"x": 40, "y": 50}, "end": [60, 50], "confidence": 92, "description": "shadow line"}],
            "hips": [{"start": [40, 50], "end": [20, 20], "confidence": 60}],
            "valleys": []
        }"#;
        let features = parse_detection(text, &projector(), LineSource::Oracle, 70.0);
        assert_eq!(features.ridges.len(), 1);
        assert_eq!(features.hips.len(), 1);
        assert_eq!(features.ridges[0].evidence_note.as_deref(), Some("shadow line"));
        assert!(!features.ridges[0].requires_review);
        assert!(features.hips[0].requires_review);
    }

    #[test]
    fn test_parse_detection_degrades_per_role() {
        let text = r#"{"ridges": [{"start": [40, 50], "end": [60, 50]}], "hips": "none"}"#;
        let features = parse_detection(text, &projector(), LineSource::Oracle, 70.0);
        assert_eq!(features.ridges.len(), 1);
        assert_eq!(features.ridges[0].confidence, DEFAULT_CONFIDENCE);
        assert!(features.hips.is_empty());
    }

    #[test]
    fn test_parse_detection_without_json_is_empty() {
        let features = parse_detection("I cannot see a roof.", &projector(), LineSource::Oracle, 70.0);
        assert!(features.is_empty());
    }

    #[test]
    fn test_parse_detection_drops_degenerate_line() {
        let text = r#"{"hips": [{"start": [40, 50], "end": [40, 50], "confidence": 90}]}"#;
        let features = parse_detection(text, &projector(), LineSource::Oracle, 70.0);
        assert!(features.hips.is_empty());
    }

    #[test]
    fn test_parse_verification() {
        let text = r#"Assessment: {"lines": [
            {"role": "ridge", "index": 0, "score": 95},
            {"type": "hips", "index": 1, "score": 40, "direction": "left", "distanceFt": 2.5},
            {"role": "chimney", "index": 0, "score": 10},
            {"index": 3}
        ]}"#;
        let report = parse_verification(text);
        assert_eq!(report.scores.len(), 2);
        assert_eq!(report.adjustments.len(), 1);
        assert_eq!(report.adjustments[0].role, LineRole::Hip);
        assert_eq!(report.adjustments[0].direction, Direction::Left);
    }
}
