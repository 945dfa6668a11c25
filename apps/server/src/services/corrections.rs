// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tenant correction history in PostgreSQL.
//!
//! Reads `roof_line_corrections(tenant_id, line_type, delta_lng, delta_lat,
//! created_at)`. The table is written by the review tooling; this service
//! only ever reads it.

use async_trait::async_trait;
use roofline_core::{CorrectionRecord, CorrectionStore, Error, LineRole, Result};
use sqlx::PgPool;

pub struct PgCorrectionStore {
    pool: PgPool,
}

impl PgCorrectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Converts raw rows, dropping unknown line types.
fn to_records(rows: Vec<(String, f64, f64)>) -> Vec<CorrectionRecord> {
    rows.into_iter()
        .filter_map(|(line_type, delta_lon, delta_lat)| match LineRole::parse(&line_type) {
            Some(role) => Some(CorrectionRecord {
                role,
                delta_lon,
                delta_lat,
            }),
            None => {
                tracing::debug!(line_type = %line_type, "Skipping correction with unknown line type");
                None
            }
        })
        .collect()
}

#[async_trait]
impl CorrectionStore for PgCorrectionStore {
    async fn recent_corrections(&self, tenant_id: &str, limit: usize) -> Result<Vec<CorrectionRecord>> {
        let rows = sqlx::query_as::<_, (String, f64, f64)>(
            r#"
            SELECT line_type, delta_lng, delta_lat
            FROM roof_line_corrections
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::CorrectionStore(e.to_string()))?;

        Ok(to_records(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_line_types_dropped() {
        let records = to_records(vec![
            ("hip".into(), 1e-6, 0.0),
            ("gutter".into(), 5e-6, 5e-6),
            ("valleys".into(), 0.0, -2e-6),
        ]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, LineRole::Hip);
        assert_eq!(records[1].role, LineRole::Valley);
    }
}
