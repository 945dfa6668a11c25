// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Roof-line topology reconstruction
//!
//! Given a building footprint and a satellite image, infers the roof's
//! structural skeleton (ridges, hips and valleys) as a topologically
//! consistent set of segments: every endpoint resolves to a perimeter corner
//! or another line's endpoint, or its line is flagged for review.
//!
//! # Pipeline
//!
//! 1. [`perimeter`] - fetch and normalize the footprint ring
//! 2. [`projection`] - image percentage <-> lon/lat at a fixed zoom
//! 3. [`oracle`] - vision-model detection and verification adapters
//! 4. [`correction`] - per-tenant learned bias
//! 5. [`snapping`] - endpoint snapping, ridges then hips then valleys
//! 6. [`connectivity`] - floating endpoint detection
//! 7. [`retry`] - one feedback retry with the floating coordinates
//! 8. [`alignment`] - bounded visual refinement loop
//! 9. [`scoring`] - quality score and manual-review flag
//!
//! [`RoofLinePipeline`] runs them in order.
//!
//! # Usage
//!
//! ```rust,ignore
//! use roofline_core::{OverlayRequest, PipelineConfig, RoofLinePipeline};
//!
//! let pipeline = RoofLinePipeline::new(
//!     PipelineConfig::default(),
//!     perimeter_source,
//!     detector,
//!     verifier,
//!     corrections,
//! );
//! let overlay = pipeline.run(&request).await?;
//! ```

pub mod alignment;
pub mod config;
pub mod connectivity;
pub mod correction;
pub mod error;
pub mod oracle;
pub mod perimeter;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod retry;
pub mod scoring;
pub mod snapping;
pub mod types;

pub use alignment::{refine_alignment, AlignmentReport, AlignmentState, LineScore, RefinementOutcome};
pub use config::PipelineConfig;
pub use connectivity::{find_floating, FloatingEndpoint};
pub use correction::{CorrectionBias, CorrectionRecord, CorrectionStore, NoCorrections};
pub use error::{Error, Result};
pub use oracle::{
    AlignmentVerifier, FeatureDetector, OracleAlignmentVerifier, OracleFeatureDetector, OracleImage,
    SceneContext, VisionOracle,
};
pub use perimeter::{Footprint, Perimeter, PerimeterSource};
pub use pipeline::{OverlayRequest, RoofLinePipeline};
pub use projection::{PercentPoint, Projector};
pub use scoring::{assess_quality, QualityAssessment};
pub use snapping::snap_features;
pub use types::{
    AlignmentAdjustment, DetectedFeatureSet, Direction, Endpoint, GeoPoint, LineRole, LineSource,
    OverlayMetadata, OverlayResult, RoofLine,
};
