// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Overlay generation and retrieval endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use roofline_core::{GeoPoint, OverlayRequest};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::services::{fetch_image, image_url_from_template, DiskCache};
use crate::types::{OverlayRequestBody, OverlayResponse};
use crate::AppState;

/// Explicit `imageUrl`, else the configured satellite template.
fn resolve_image_url(
    request: &OverlayRequestBody,
    config: &Config,
    center: GeoPoint,
) -> Result<String, ApiError> {
    if let Some(url) = &request.image_url {
        return Ok(url.clone());
    }
    config
        .satellite_image_url_template
        .as_deref()
        .map(|template| {
            image_url_from_template(
                template,
                center,
                config.pipeline.zoom,
                config.pipeline.image_size_px,
            )
        })
        .ok_or_else(|| {
            ApiError::InvalidRequest(
                "imageUrl is required when no satellite image template is configured".into(),
            )
        })
}

/// Whether a stored overlay may answer this request. Tenant requests always
/// recompute so the correction bias reflects the latest history.
fn reads_cache(body: &OverlayRequestBody) -> bool {
    !body.skip_cache && body.tenant_id.is_none()
}

/// POST /api/v1/overlay - Generate a roof-line overlay.
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn create_overlay(
    State(state): State<AppState>,
    payload: Result<Json<OverlayRequestBody>, JsonRejection>,
) -> Result<Json<OverlayResponse>, ApiError> {
    let start = Instant::now();
    let Json(body) = payload?;

    let center = body.center()?;
    let request = body.normalized();
    let image_url = resolve_image_url(&request, &state.config, center)?;
    let cache_key = DiskCache::generate_key(&request)?;

    if reads_cache(&body) {
        match state.cache.get::<OverlayResponse>(&cache_key).await {
            Ok(Some(mut cached)) => {
                cached.from_cache = true;
                cached.processing_time_ms = start.elapsed().as_millis() as u64;
                tracing::info!(key = %cache_key, "Cache HIT");
                return Ok(Json(cached));
            }
            Ok(None) => tracing::debug!(key = %cache_key, "Cache MISS"),
            Err(e) => tracing::warn!(error = %e, "Cache lookup failed"),
        }
    }

    let base_image = match fetch_image(&state.http, &image_url).await {
        Ok(image) => Some(Arc::new(image)),
        Err(e) => {
            tracing::warn!(error = %e, "Source image unavailable, verifying against URL only");
            None
        }
    };

    let overlay = state
        .pipeline
        .run(&OverlayRequest {
            center,
            address: request.address.clone(),
            image_url,
            base_image,
            tenant_id: request.tenant_id.clone(),
        })
        .await?;

    let response = OverlayResponse {
        success: true,
        data: overlay.into(),
        processing_time_ms: start.elapsed().as_millis() as u64,
        cache_key: cache_key.clone(),
        from_cache: false,
    };

    if let Err(e) = state.cache.set(&cache_key, &response).await {
        tracing::warn!(error = %e, "Failed to cache overlay");
    }

    tracing::info!(
        quality_score = response.data.metadata.quality_score,
        requires_manual_review = response.data.metadata.requires_manual_review,
        processing_time_ms = response.processing_time_ms,
        "Overlay complete"
    );

    Ok(Json(response))
}

/// GET /api/v1/overlay/:key - Retrieve cached overlay.
pub async fn get_overlay(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<OverlayResponse>, ApiError> {
    match state.cache.get::<OverlayResponse>(&key).await? {
        Some(mut response) => {
            response.from_cache = true;
            tracing::info!(key = %key, "Cache HIT");
            Ok(Json(response))
        }
        None => {
            tracing::debug!(key = %key, "Cache MISS");
            Err(ApiError::NotFound(format!("Overlay not found: {}", key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(template: Option<&str>) -> Config {
        Config {
            satellite_image_url_template: template.map(str::to_string),
            ..Config::from_env()
        }
    }

    #[test]
    fn test_tenant_requests_bypass_cache() {
        assert!(reads_cache(&OverlayRequestBody::default()));
        assert!(!reads_cache(&OverlayRequestBody {
            skip_cache: true,
            ..Default::default()
        }));
        assert!(!reads_cache(&OverlayRequestBody {
            tenant_id: Some("acme".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_explicit_image_url_wins() {
        let request = OverlayRequestBody {
            image_url: Some("https://x/roof.png".into()),
            ..Default::default()
        };
        let url = resolve_image_url(&request, &config(Some("https://t/{lat}")), GeoPoint::new(0.0, 1.0))
            .unwrap();
        assert_eq!(url, "https://x/roof.png");
    }

    #[test]
    fn test_template_fallback() {
        let request = OverlayRequestBody::default();
        let url = resolve_image_url(
            &request,
            &config(Some("https://t/{lat}/{lng}/{zoom}")),
            GeoPoint::new(2.0, 1.0),
        )
        .unwrap();
        assert!(url.starts_with("https://t/1.0000000/2.0000000/"));

        assert!(matches!(
            resolve_image_url(&request, &config(None), GeoPoint::new(2.0, 1.0)),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
