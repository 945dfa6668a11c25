// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Overlay rendering for verification mode

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::error::Result;
use crate::perimeter::Perimeter;
use crate::projection::Projector;
use crate::types::{DetectedFeatureSet, GeoPoint, LineRole};

const PERIMETER_COLOR: Rgba<u8> = Rgba([255, 220, 0, 255]);

/// Stroke color per role
pub fn role_color(role: LineRole) -> Rgba<u8> {
    match role {
        LineRole::Ridge => Rgba([230, 30, 30, 255]),
        LineRole::Hip => Rgba([30, 90, 240, 255]),
        LineRole::Valley => Rgba([20, 200, 60, 255]),
    }
}

/// Decode fetched image bytes (PNG or JPEG) into RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode an RGBA image as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Draws the perimeter and every roof line onto a copy of `base`.
///
/// The projector's nominal image size may differ from the fetched image
/// (high-DPI tiles), so pixel positions are rescaled to the actual width.
pub fn render_overlay(
    base: &RgbaImage,
    projector: &Projector,
    perimeter: &Perimeter,
    features: &DetectedFeatureSet,
) -> RgbaImage {
    let mut img = base.clone();
    let scale = img.width() as f32 / projector.image_size_px().max(1) as f32;

    let vertices = perimeter.vertices();
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        draw_thick(&mut img, projector, scale, vertices[i], vertices[j], PERIMETER_COLOR);
    }

    for (role, _, line) in features.iter() {
        draw_thick(&mut img, projector, scale, line.start, line.end, role_color(role));
    }

    img
}

fn draw_thick(
    img: &mut RgbaImage,
    projector: &Projector,
    scale: f32,
    a: GeoPoint,
    b: GeoPoint,
    color: Rgba<u8>,
) {
    let (Ok((ax, ay)), Ok((bx, by))) = (projector.to_pixel(a), projector.to_pixel(b)) else {
        return;
    };
    let (ax, ay, bx, by) = (ax * scale, ay * scale, bx * scale, by * scale);

    // 3px stroke: center line plus one pixel either side
    for offset in [-1.0f32, 0.0, 1.0] {
        draw_line_segment_mut(img, (ax + offset, ay), (bx + offset, by), color);
        draw_line_segment_mut(img, (ax, ay + offset), (bx, by + offset), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::PercentPoint;
    use crate::types::{LineSource, RoofLine};

    #[test]
    fn test_render_marks_ridge_pixels() {
        let projector = Projector::new(GeoPoint::new(-97.7431, 30.2672), 20, 100).unwrap();
        let at = |x, y| projector.to_geo(PercentPoint::new(x, y)).unwrap();
        let perimeter =
            Perimeter::from_footprint(&[at(10.0, 10.0), at(90.0, 10.0), at(90.0, 90.0), at(10.0, 90.0)])
                .unwrap();
        let mut features = DetectedFeatureSet::new();
        features
            .ridges
            .push(RoofLine::new(at(30.0, 50.0), at(70.0, 50.0), 90.0, LineSource::Oracle));

        let base = RgbaImage::new(100, 100);
        let out = render_overlay(&base, &projector, &perimeter, &features);

        assert_eq!(*out.get_pixel(50, 50), role_color(LineRole::Ridge));
        assert_eq!(*out.get_pixel(10, 50), PERIMETER_COLOR);
        assert_eq!(*out.get_pixel(50, 30), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_png_round_trip_dimensions() {
        let img = RgbaImage::new(8, 4);
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 4));
    }
}
