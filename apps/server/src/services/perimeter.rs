// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building footprint service client.

use async_trait::async_trait;
use roofline_core::{Error, Footprint, GeoPoint, PerimeterSource, Result};
use serde::{Deserialize, Serialize};

pub struct HttpPerimeterSource {
    url: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct FootprintRequest<'a> {
    lat: f64,
    lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FootprintResponse {
    #[serde(default)]
    footprint: Vec<[f64; 2]>,
    #[serde(default)]
    roof_type: Option<String>,
    #[serde(default)]
    area_sqft: Option<f64>,
}

impl From<FootprintResponse> for Footprint {
    fn from(r: FootprintResponse) -> Self {
        Footprint {
            polygon: r.footprint.into_iter().map(GeoPoint::from).collect(),
            roof_type: r.roof_type.filter(|t| !t.trim().is_empty()),
            area_sqft: r.area_sqft.filter(|a| a.is_finite() && *a > 0.0),
        }
    }
}

impl HttpPerimeterSource {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }
}

#[async_trait]
impl PerimeterSource for HttpPerimeterSource {
    async fn footprint(&self, address: Option<&str>, center: GeoPoint) -> Result<Footprint> {
        let resp = self
            .http
            .post(&self.url)
            .json(&FootprintRequest {
                lat: center.lat,
                lng: center.lon,
                address,
            })
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Footprint request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "Footprint service returned {}",
                resp.status()
            )));
        }

        let body: FootprintResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Footprint response parse failed: {e}")))?;

        tracing::debug!(vertices = body.footprint.len(), "Footprint received");
        Ok(body.into())
    }
}
