// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for roof-line reconstruction.

/// Result type alias for roof-line operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconstructing a roof overlay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A coordinate was NaN or infinite.
    #[error("non-finite coordinate: ({0}, {1})")]
    NonFiniteCoordinate(f64, f64),

    /// The footprint has fewer than 3 distinct vertices after normalization.
    #[error("perimeter has {0} distinct vertices, at least 3 are required")]
    DegeneratePerimeter(usize),

    /// The perimeter/area source failed or returned no usable footprint.
    #[error("perimeter source failed: {0}")]
    Upstream(String),

    /// The vision oracle could not be reached or returned an error status.
    #[error("vision oracle failed: {0}")]
    Oracle(String),

    /// The oracle response contained no extractable JSON.
    #[error("oracle response could not be parsed: {0}")]
    OracleParse(String),

    /// The correction store query failed.
    #[error("correction store failed: {0}")]
    CorrectionStore(String),

    /// Overlay rendering or image encoding failed.
    #[error("overlay rendering failed: {0}")]
    Render(String),

    /// The request was rejected before the pipeline ran.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Render(err.to_string())
    }
}
