//! SQLite repository implementing the result sink, outcome store, and
//! durable FX-rate cache.
//!
//! Monetary amounts persist as canonical decimal strings; structured
//! evidence and related event ids persist as JSON text.

use crate::domain::{
    AnomalyType, ClaimOutcome, Currency, Decimal, DetectionResult, DetectionStatus, Evidence,
    OutcomeRecord, SellerId, Severity, SyncId, TimeMs,
};
use crate::store::{OutcomeStore, OutcomeUpdate, RateStore, ResultSink, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    fn bind_result_values<'q>(
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        result: &'q DetectionResult,
        evidence_json: String,
        related_json: String,
        created_at: i64,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        query
            .bind(result.detection_key.as_str())
            .bind(result.seller_id.as_str())
            .bind(result.sync_id.as_str())
            .bind(result.anomaly_type.as_str())
            .bind(result.severity.as_str())
            .bind(result.estimated_value.to_canonical_string())
            .bind(result.currency.as_str())
            .bind(result.confidence)
            .bind(evidence_json)
            .bind(related_json)
            .bind(result.status.as_str())
            .bind(result.discovery_date.as_ms())
            .bind(result.deadline_date.map(|d| d.as_ms()))
            .bind(result.days_remaining)
            .bind(created_at)
    }

    /// Query stored detection results for a seller, newest batches first.
    pub async fn query_results(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<DetectionResult>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT detection_key, seller_id, sync_id, anomaly_type, severity,
                   estimated_value, currency, confidence_score, evidence,
                   related_event_ids, status, discovery_date, deadline_date,
                   days_remaining
            FROM detection_results
            WHERE seller_id = ?
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(seller_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_result).collect())
    }
}

fn row_to_result(row: &sqlx::sqlite::SqliteRow) -> Option<DetectionResult> {
    let anomaly_str: String = row.get("anomaly_type");
    let anomaly_type = match AnomalyType::parse(&anomaly_str) {
        Some(t) => t,
        None => {
            warn!(anomaly_type = %anomaly_str, "unknown anomaly type in row; skipping");
            return None;
        }
    };

    let severity_str: String = row.get("severity");
    let value_str: String = row.get("estimated_value");
    let evidence_str: String = row.get("evidence");
    let related_str: String = row.get("related_event_ids");
    let status_str: String = row.get("status");

    let evidence: Evidence = serde_json::from_str(&evidence_str).unwrap_or_else(|e| {
        warn!(error = %e, "unparseable evidence JSON; using empty evidence");
        Evidence::new()
    });
    let related_event_ids: Vec<String> =
        serde_json::from_str(&related_str).unwrap_or_default();

    Some(DetectionResult {
        detection_key: row.get("detection_key"),
        seller_id: SellerId::new(row.get::<String, _>("seller_id")),
        sync_id: SyncId::new(row.get::<String, _>("sync_id")),
        anomaly_type,
        severity: Severity::parse(&severity_str).unwrap_or(Severity::Low),
        estimated_value: Decimal::parse(&value_str).unwrap_or_default(),
        currency: Currency::new(row.get::<String, _>("currency")),
        confidence: row.get("confidence_score"),
        evidence,
        related_event_ids,
        status: match status_str.as_str() {
            "under_review" => DetectionStatus::UnderReview,
            "filed" => DetectionStatus::Filed,
            "resolved" => DetectionStatus::Resolved,
            "dismissed" => DetectionStatus::Dismissed,
            _ => DetectionStatus::Pending,
        },
        discovery_date: TimeMs::new(row.get("discovery_date")),
        deadline_date: row
            .get::<Option<i64>, _>("deadline_date")
            .map(TimeMs::new),
        days_remaining: row.get("days_remaining"),
        // Raw valuation facts are a run-time hand-off, not a persisted column.
        claim_facts: None,
    })
}

const INSERT_RESULT_SQL: &str = r#"
INSERT INTO detection_results (
    detection_key, seller_id, sync_id, anomaly_type, severity,
    estimated_value, currency, confidence_score, evidence,
    related_event_ids, status, discovery_date, deadline_date,
    days_remaining, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(seller_id, sync_id, anomaly_type, detection_key) DO NOTHING
"#;

const UPSERT_RESULT_SQL: &str = r#"
INSERT INTO detection_results (
    detection_key, seller_id, sync_id, anomaly_type, severity,
    estimated_value, currency, confidence_score, evidence,
    related_event_ids, status, discovery_date, deadline_date,
    days_remaining, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(seller_id, sync_id, anomaly_type, detection_key) DO UPDATE SET
    severity = excluded.severity,
    estimated_value = excluded.estimated_value,
    currency = excluded.currency,
    confidence_score = excluded.confidence_score,
    evidence = excluded.evidence,
    related_event_ids = excluded.related_event_ids,
    discovery_date = excluded.discovery_date,
    deadline_date = excluded.deadline_date,
    days_remaining = excluded.days_remaining
"#;

#[async_trait]
impl ResultSink for Repository {
    async fn insert_results(&self, results: &[DetectionResult]) -> Result<usize, StoreError> {
        if results.is_empty() {
            return Ok(0);
        }

        let created_at = TimeMs::now().as_ms();
        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for result in results {
            let evidence_json = serde_json::to_string(&result.evidence)?;
            let related_json = serde_json::to_string(&result.related_event_ids)?;
            let outcome = Self::bind_result_values(
                sqlx::query(INSERT_RESULT_SQL),
                result,
                evidence_json,
                related_json,
                created_at,
            )
            .execute(&mut *tx)
            .await?;

            if outcome.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    async fn upsert_result(&self, result: &DetectionResult) -> Result<(), StoreError> {
        let evidence_json = serde_json::to_string(&result.evidence)?;
        let related_json = serde_json::to_string(&result.related_event_ids)?;
        Self::bind_result_values(
            sqlx::query(UPSERT_RESULT_SQL),
            result,
            evidence_json,
            related_json,
            TimeMs::now().as_ms(),
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for Repository {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO claim_outcomes (
                detection_key, anomaly_type, predicted_confidence, outcome,
                claimed_amount, recovery_amount, filed_date, resolution_date,
                recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(detection_key) DO UPDATE SET
                outcome = excluded.outcome,
                recovery_amount = excluded.recovery_amount,
                resolution_date = excluded.resolution_date,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(record.detection_key.as_str())
        .bind(record.anomaly_type.as_str())
        .bind(record.predicted_confidence)
        .bind(record.outcome.as_str())
        .bind(record.claimed_amount.to_canonical_string())
        .bind(record.recovery_amount.to_canonical_string())
        .bind(record.filed_date.map(|d| d.as_ms()))
        .bind(record.resolution_date.map(|d| d.as_ms()))
        .bind(record.recorded_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_outcome(
        &self,
        detection_key: &str,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError> {
        let outcome = sqlx::query(
            r#"
            UPDATE claim_outcomes SET
                outcome = COALESCE(?, outcome),
                recovery_amount = COALESCE(?, recovery_amount),
                resolution_date = COALESCE(?, resolution_date)
            WHERE detection_key = ?
            "#,
        )
        .bind(update.outcome.map(|o| o.as_str()))
        .bind(update.recovery_amount.map(|a| a.to_canonical_string()))
        .bind(update.resolution_date.map(|d| d.as_ms()))
        .bind(detection_key)
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(StoreError::Other(format!(
                "no outcome for {detection_key}"
            )));
        }
        Ok(())
    }

    async fn fetch_outcomes(
        &self,
        anomaly_type: AnomalyType,
    ) -> Result<Vec<OutcomeRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT detection_key, anomaly_type, predicted_confidence, outcome,
                   claimed_amount, recovery_amount, filed_date, resolution_date,
                   recorded_at
            FROM claim_outcomes
            WHERE anomaly_type = ?
            ORDER BY recorded_at ASC, detection_key ASC
            "#,
        )
        .bind(anomaly_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let outcome_str: String = row.get("outcome");
                let claimed_str: String = row.get("claimed_amount");
                let recovery_str: String = row.get("recovery_amount");
                OutcomeRecord {
                    detection_key: row.get("detection_key"),
                    anomaly_type,
                    predicted_confidence: row.get("predicted_confidence"),
                    outcome: ClaimOutcome::parse(&outcome_str)
                        .unwrap_or(ClaimOutcome::Pending),
                    claimed_amount: Decimal::parse(&claimed_str).unwrap_or_default(),
                    recovery_amount: Decimal::parse(&recovery_str).unwrap_or_default(),
                    filed_date: row.get::<Option<i64>, _>("filed_date").map(TimeMs::new),
                    resolution_date: row
                        .get::<Option<i64>, _>("resolution_date")
                        .map(TimeMs::new),
                    recorded_at: TimeMs::new(row.get("recorded_at")),
                }
            })
            .collect())
    }
}

#[async_trait]
impl RateStore for Repository {
    async fn get_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
    ) -> Result<Option<Decimal>, StoreError> {
        let row = sqlx::query(
            "SELECT rate FROM fx_rates WHERE from_currency = ? AND to_currency = ? AND day = ?",
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            let rate_str: String = r.get("rate");
            Decimal::parse(&rate_str).ok()
        }))
    }

    async fn put_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
        rate: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO fx_rates (from_currency, to_currency, day, rate, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(from_currency, to_currency, day) DO UPDATE SET
                rate = excluded.rate,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(day)
        .bind(rate.to_canonical_string())
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
