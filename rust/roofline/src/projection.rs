// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image-percentage <-> geographic coordinate projection.
//!
//! Images are square Web-Mercator tiles centered on a known point. Positions
//! inside the image are expressed as percentages (0-100 on each axis, origin
//! top-left), which is what the vision oracle speaks.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{GeoPoint, METERS_PER_DEGREE_LAT};

/// Ground resolution of a zoom-0 Web-Mercator tile at the equator (m/px).
const EQUATOR_METERS_PER_PIXEL: f64 = 156_543.033_92;

/// A position inside the image, in percent of width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentPoint {
    pub x: f64,
    pub y: f64,
}

impl PercentPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates finite and within the image.
    pub fn in_frame(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=100.0).contains(&self.x)
            && (0.0..=100.0).contains(&self.y)
    }
}

/// Stateless projector for one image frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    center: GeoPoint,
    zoom: u8,
    image_size_px: u32,
}

impl Projector {
    pub fn new(center: GeoPoint, zoom: u8, image_size_px: u32) -> Result<Self> {
        if !center.is_finite() {
            return Err(Error::NonFiniteCoordinate(center.lon, center.lat));
        }
        Ok(Self {
            center,
            zoom,
            image_size_px,
        })
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn image_size_px(&self) -> u32 {
        self.image_size_px
    }

    /// Web-Mercator ground resolution at the center latitude.
    #[inline]
    pub fn meters_per_pixel(&self) -> f64 {
        EQUATOR_METERS_PER_PIXEL * self.center.lat.to_radians().cos() / 2f64.powi(self.zoom as i32)
    }

    #[inline]
    fn degrees_per_pixel(&self) -> (f64, f64) {
        let mpp = self.meters_per_pixel();
        let cos_lat = self.center.lat.to_radians().cos();
        let lat = mpp / METERS_PER_DEGREE_LAT;
        // Meridians converge toward the poles, so a longitude degree is shorter.
        let lon = mpp / (METERS_PER_DEGREE_LAT * cos_lat);
        (lon, lat)
    }

    /// Converts an image percentage position to a geographic point.
    pub fn to_geo(&self, p: PercentPoint) -> Result<GeoPoint> {
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(Error::NonFiniteCoordinate(p.x, p.y));
        }
        let size = self.image_size_px as f64;
        let dx_px = (p.x - 50.0) / 100.0 * size;
        let dy_px = (p.y - 50.0) / 100.0 * size;
        let (lon_per_px, lat_per_px) = self.degrees_per_pixel();

        Ok(GeoPoint::new(
            self.center.lon + dx_px * lon_per_px,
            // Image y grows downward, latitude grows upward
            self.center.lat - dy_px * lat_per_px,
        ))
    }

    /// Converts a geographic point to an image percentage position.
    ///
    /// Points outside the image produce percentages outside 0-100; they are
    /// not clamped.
    pub fn to_percent(&self, g: GeoPoint) -> Result<PercentPoint> {
        if !g.is_finite() {
            return Err(Error::NonFiniteCoordinate(g.lon, g.lat));
        }
        let size = self.image_size_px as f64;
        let (lon_per_px, lat_per_px) = self.degrees_per_pixel();
        let dx_px = (g.lon - self.center.lon) / lon_per_px;
        let dy_px = (self.center.lat - g.lat) / lat_per_px;

        Ok(PercentPoint::new(
            50.0 + dx_px / size * 100.0,
            50.0 + dy_px / size * 100.0,
        ))
    }

    /// Converts a geographic point to pixel coordinates in the image.
    pub fn to_pixel(&self, g: GeoPoint) -> Result<(f32, f32)> {
        let p = self.to_percent(g)?;
        let size = self.image_size_px as f64;
        Ok(((p.x / 100.0 * size) as f32, (p.y / 100.0 * size) as f32))
    }
}
