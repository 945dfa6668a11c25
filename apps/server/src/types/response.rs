// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use roofline_core::{OverlayMetadata, OverlayResult, RoofLine};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Successful overlay response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayResponse {
    pub success: bool,
    pub data: OverlayData,
    /// Wall time spent producing this response (ms).
    pub processing_time_ms: u64,
    /// Cache key for this result (SHA256 of the normalized request).
    pub cache_key: String,
    /// Whether result was from cache.
    #[serde(default)]
    pub from_cache: bool,
}

/// Reconstructed roof skeleton. Coordinates are `[lng, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayData {
    pub perimeter: Vec<[f64; 2]>,
    pub ridges: Vec<RoofLineDto>,
    pub hips: Vec<RoofLineDto>,
    pub valleys: Vec<RoofLineDto>,
    pub metadata: OverlayMetadataDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoofLineDto {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub confidence: f64,
    pub requires_review: bool,
    pub source: String,
    /// Both endpoints resolved to a topological target.
    pub snapped_to_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_evidence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayMetadataDto {
    pub roof_type: String,
    pub quality_score: f64,
    pub data_sources_priority: Vec<String>,
    pub requires_manual_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_area_sqft: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    pub alignment_attempts: u32,
}

impl From<&RoofLine> for RoofLineDto {
    fn from(line: &RoofLine) -> Self {
        Self {
            start: line.start.into(),
            end: line.end.into(),
            confidence: line.confidence,
            requires_review: line.requires_review,
            source: line.source.as_str().to_string(),
            snapped_to_target: line.snapped(),
            visual_evidence: line.evidence_note.clone(),
        }
    }
}

impl From<OverlayMetadata> for OverlayMetadataDto {
    fn from(m: OverlayMetadata) -> Self {
        Self {
            roof_type: m.roof_type,
            quality_score: m.quality_score,
            data_sources_priority: m.data_sources_priority,
            requires_manual_review: m.requires_manual_review,
            total_area_sqft: m.total_area_sqft,
            processed_at: m.processed_at,
            alignment_attempts: m.alignment_attempts,
        }
    }
}

impl From<OverlayResult> for OverlayData {
    fn from(result: OverlayResult) -> Self {
        let lines = |lines: &[RoofLine]| lines.iter().map(RoofLineDto::from).collect::<Vec<_>>();
        Self {
            perimeter: result.perimeter.vertices().iter().map(|&v| v.into()).collect(),
            ridges: lines(&result.ridges),
            hips: lines(&result.hips),
            valleys: lines(&result.valleys),
            metadata: result.metadata.into(),
        }
    }
}
