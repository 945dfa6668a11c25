// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::str::FromStr;

use roofline_core::PipelineConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory for cache storage.
    pub cache_dir: String,
    /// Maximum cache age in days.
    pub cache_max_age_days: u64,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// PostgreSQL URL for tenant corrections; corrections are disabled when unset.
    pub database_url: Option<String>,
    /// Messages-style vision oracle endpoint.
    pub oracle_url: String,
    pub oracle_api_key: Option<String>,
    pub oracle_model: String,
    pub oracle_max_tokens: u32,
    /// Building footprint service endpoint.
    pub perimeter_source_url: String,
    /// Satellite image URL with `{lat}`, `{lng}`, `{zoom}` and `{size}` placeholders.
    pub satellite_image_url_template: Option<String>,
    /// Allowed CORS origins (comma-separated, or "*" for all).
    pub cors_origins: Vec<String>,
    /// Reconstruction tunables.
    pub pipeline: PipelineConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            snap_tolerance_ft: env_or("SNAP_TOLERANCE_FT", defaults.snap_tolerance_ft),
            validation_tolerance_multiplier: env_or(
                "VALIDATION_TOLERANCE_MULTIPLIER",
                defaults.validation_tolerance_multiplier,
            ),
            merge_tolerance_multiplier: env_or(
                "MERGE_TOLERANCE_MULTIPLIER",
                defaults.merge_tolerance_multiplier,
            ),
            zoom: env_or("MAP_ZOOM", defaults.zoom),
            image_size_px: env_or("IMAGE_SIZE_PX", defaults.image_size_px),
            max_alignment_attempts: env_or("MAX_ALIGNMENT_ATTEMPTS", defaults.max_alignment_attempts),
            min_alignment_score: env_or("MIN_ALIGNMENT_SCORE", defaults.min_alignment_score),
            correction_history_limit: env_or(
                "CORRECTION_HISTORY_LIMIT",
                defaults.correction_history_limit,
            ),
            ..defaults
        };

        Self {
            port: env_or("PORT", 8080),
            cache_dir: std::env::var("CACHE_DIR").unwrap_or_else(|_| {
                if std::path::Path::new("/.dockerenv").exists() {
                    "/app/cache".into()
                } else {
                    std::env::current_dir()
                        .ok()
                        .and_then(|dir| dir.join(".cache").to_str().map(|s| s.to_string()))
                        .unwrap_or_else(|| "./.cache".into())
                }
            }),
            cache_max_age_days: env_or("CACHE_MAX_AGE_DAYS", 1),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            database_url: env_opt("DATABASE_URL"),
            oracle_url: std::env::var("ORACLE_URL")
                .unwrap_or_else(|_| "http://localhost:8090/v1/messages".into()),
            oracle_api_key: env_opt("ORACLE_API_KEY"),
            oracle_model: std::env::var("ORACLE_MODEL").unwrap_or_else(|_| "vision-large".into()),
            oracle_max_tokens: env_or("ORACLE_MAX_TOKENS", 4096),
            perimeter_source_url: std::env::var("PERIMETER_SOURCE_URL")
                .unwrap_or_else(|_| "http://localhost:8091/v1/footprint".into()),
            satellite_image_url_template: env_opt("SATELLITE_IMAGE_URL_TEMPLATE"),
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".into()),
            ),
            pipeline,
        }
    }

    pub fn cache_max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_max_age_days * 86_400)
    }

    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
