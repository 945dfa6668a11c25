// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-tenant correction bias learned from human edits.
//!
//! Reviewers nudge lines after the fact; each nudge is stored as a
//! `(role, Δlon, Δlat)` record. The bias for a role is the plain arithmetic
//! mean of the tenant's most recent records. It is recomputed for every
//! request and never cached.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DetectedFeatureSet, LineRole, LineSource};

/// One historical human correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub role: LineRole,
    pub delta_lon: f64,
    pub delta_lat: f64,
}

/// Read-only store of correction records.
#[async_trait]
pub trait CorrectionStore: Send + Sync {
    /// Most recent `limit` records for `tenant_id`, newest first.
    async fn recent_corrections(&self, tenant_id: &str, limit: usize)
        -> Result<Vec<CorrectionRecord>>;
}

/// Mean `(Δlon, Δlat)` per role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionBias {
    per_role: FxHashMap<LineRole, (f64, f64)>,
    samples: usize,
}

impl CorrectionBias {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[CorrectionRecord]) -> Self {
        let mut sums: FxHashMap<LineRole, (f64, f64, usize)> = FxHashMap::default();
        let mut samples = 0;
        for r in records {
            if !r.delta_lon.is_finite() || !r.delta_lat.is_finite() {
                continue;
            }
            let entry = sums.entry(r.role).or_insert((0.0, 0.0, 0));
            entry.0 += r.delta_lon;
            entry.1 += r.delta_lat;
            entry.2 += 1;
            samples += 1;
        }

        let per_role = sums
            .into_iter()
            .map(|(role, (lon, lat, n))| (role, (lon / n as f64, lat / n as f64)))
            .collect();

        Self { per_role, samples }
    }

    /// Mean delta for `role`, or zero without history.
    pub fn for_role(&self, role: LineRole) -> (f64, f64) {
        self.per_role.get(&role).copied().unwrap_or((0.0, 0.0))
    }

    pub fn is_zero(&self) -> bool {
        self.per_role
            .values()
            .all(|&(lon, lat)| lon == 0.0 && lat == 0.0)
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Returns a copy of `features` with each line shifted by its role's bias.
    ///
    /// Shifted first-pass lines are re-tagged [`LineSource::OracleCorrected`].
    pub fn apply(&self, features: &DetectedFeatureSet) -> DetectedFeatureSet {
        let mut out = features.clone();
        for role in LineRole::ALL {
            let (dlon, dlat) = self.for_role(role);
            if dlon == 0.0 && dlat == 0.0 {
                continue;
            }
            for line in out.lines_mut(role) {
                line.translate(dlon, dlat);
                if line.source == LineSource::Oracle {
                    line.source = LineSource::OracleCorrected;
                }
            }
        }
        out
    }
}

/// Loads the tenant's bias, falling back to zero on a missing tenant or a
/// store failure.
pub async fn load_bias(
    store: &dyn CorrectionStore,
    tenant_id: Option<&str>,
    limit: usize,
) -> CorrectionBias {
    let Some(tenant_id) = tenant_id else {
        return CorrectionBias::zero();
    };

    match store.recent_corrections(tenant_id, limit).await {
        Ok(records) => {
            let bias = CorrectionBias::from_records(&records);
            tracing::debug!(tenant_id, samples = bias.sample_count(), "Loaded correction bias");
            bias
        }
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "Correction fetch failed, using zero bias");
            CorrectionBias::zero()
        }
    }
}

/// Store with no history; used when no database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCorrections;

#[async_trait]
impl CorrectionStore for NoCorrections {
    async fn recent_corrections(&self, _tenant_id: &str, _limit: usize) -> Result<Vec<CorrectionRecord>> {
        Ok(Vec::new())
    }
}
