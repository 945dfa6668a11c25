// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use roofline_core::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Body of `POST /api/v1/overlay`.
///
/// `lat`/`lng` are optional at the type level so a missing coordinate is
/// reported as a structured client error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRequestBody {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Skip cache lookup if true.
    #[serde(default, skip_serializing)]
    pub skip_cache: bool,
}

impl OverlayRequestBody {
    /// Validated request center.
    pub fn center(&self) -> Result<GeoPoint, ApiError> {
        let (Some(lat), Some(lng)) = (self.lat, self.lng) else {
            return Err(ApiError::MissingCoordinates);
        };
        let center = GeoPoint::new(lng, lat);
        if !center.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(ApiError::InvalidRequest(format!(
                "coordinates out of range: lat={lat}, lng={lng}"
            )));
        }
        Ok(center)
    }

    /// Canonical form used for the cache key: trimmed strings, blanks dropped.
    pub fn normalized(&self) -> Self {
        let clean = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            lat: self.lat,
            lng: self.lng,
            address: clean(&self.address),
            image_url: clean(&self.image_url),
            tenant_id: clean(&self.tenant_id),
            skip_cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_coordinates() {
        let body: OverlayRequestBody = serde_json::from_str(r#"{"lat": 30.2}"#).unwrap();
        assert!(matches!(body.center(), Err(ApiError::MissingCoordinates)));
    }

    #[test]
    fn test_out_of_range() {
        let body: OverlayRequestBody = serde_json::from_str(r#"{"lat": 95.0, "lng": 10.0}"#).unwrap();
        assert!(matches!(body.center(), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_camel_case_fields() {
        let body: OverlayRequestBody = serde_json::from_str(
            r#"{"lat": 30.2672, "lng": -97.7431, "imageUrl": " https://x/y.png ", "tenantId": "", "skipCache": true}"#,
        )
        .unwrap();
        assert!(body.skip_cache);
        let center = body.center().unwrap();
        assert_eq!(center.lon, -97.7431);

        let normalized = body.normalized();
        assert_eq!(normalized.image_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(normalized.tenant_id, None);
    }
}
