// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Concrete collaborators for the roof-line pipeline, plus result caching.

pub mod cache;
pub mod corrections;
pub mod imagery;
pub mod oracle;
pub mod perimeter;

pub use cache::DiskCache;
pub use corrections::PgCorrectionStore;
pub use imagery::{fetch_image, image_url_from_template};
pub use oracle::HttpVisionOracle;
pub use perimeter::HttpPerimeterSource;
