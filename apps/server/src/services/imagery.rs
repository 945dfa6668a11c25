// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Satellite image URLs and fetching.

use image::RgbaImage;
use roofline_core::render::decode_image;
use roofline_core::{Error, GeoPoint, Result};

/// Fills `{lat}`, `{lng}`, `{zoom}` and `{size}` in `template`.
pub fn image_url_from_template(template: &str, center: GeoPoint, zoom: u8, size_px: u32) -> String {
    template
        .replace("{lat}", &format!("{:.7}", center.lat))
        .replace("{lng}", &format!("{:.7}", center.lon))
        .replace("{zoom}", &zoom.to_string())
        .replace("{size}", &size_px.to_string())
}

/// Downloads and decodes the source image.
pub async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<RgbaImage> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Render(format!("image request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(Error::Render(format!("image fetch returned {}", resp.status())));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::Render(format!("image body read failed: {e}")))?;
    decode_image(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template() {
        let url = image_url_from_template(
            "https://tiles.test/static?center={lat},{lng}&zoom={zoom}&size={size}x{size}",
            GeoPoint::new(-97.7431, 30.2672),
            20,
            640,
        );
        assert_eq!(
            url,
            "https://tiles.test/static?center=30.2672000,-97.7431000&zoom=20&size=640x640"
        );
    }
}
