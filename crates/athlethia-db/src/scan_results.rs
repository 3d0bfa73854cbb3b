//! Scan history operations.
//!
//! Every finished scan is written to `scan_results` for audit. Signals are
//! stored as a JSON array so the full breakdown can be replayed later.

use athlethia_core::{NormalizedTarget, ScanResult, SignalResult, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// Aggregate counts over the scan history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Number of stored scans
    pub total_scans: i64,
    /// Scans that ended with a `Scam` verdict
    pub scam_detections: i64,
    /// Scans that ended with a `Suspicious` verdict
    pub suspicious_detections: i64,
    /// `scam_detections / total_scans`, 0 when there are no scans
    pub detection_rate: f64,
}

/// Insert a finished scan.
///
/// # Errors
/// Returns `sqlx::Error` if the insert fails or the signals cannot be encoded.
pub async fn insert_scan(pool: &Pool<Sqlite>, result: &ScanResult) -> Result<(), sqlx::Error> {
    let signals_json =
        serde_json::to_string(&result.signals).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO scan_results (id, url, raw_target, domain, source_context, verdict,
                                   confidence, is_scam, signals, cache_hit, scanned_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(result.id.to_string())
    .bind(result.target_str())
    .bind(&result.raw_target)
    .bind(result.domain())
    .bind(&result.source_context)
    .bind(result.verdict.to_string())
    .bind(result.confidence)
    .bind(result.is_scam())
    .bind(&signals_json)
    .bind(result.cache_hit)
    .bind(result.computed_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a scan by ID.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails or the stored row is corrupt.
pub async fn get_scan(pool: &Pool<Sqlite>, id: &Uuid) -> Result<Option<ScanResult>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, url, raw_target, domain, source_context, verdict, confidence,
                signals, cache_hit, scanned_at
         FROM scan_results WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(parse_scan_from_row).transpose()
}

/// Most recent scans first.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn recent_scans(pool: &Pool<Sqlite>, limit: u32) -> Result<Vec<ScanResult>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, url, raw_target, domain, source_context, verdict, confidence,
                signals, cache_hit, scanned_at
         FROM scan_results
         ORDER BY scanned_at DESC
         LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    parse_scans_from_rows(&rows)
}

/// Latest stored scan for a canonical URL.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn latest_scan_for(
    pool: &Pool<Sqlite>,
    url: &str,
) -> Result<Option<ScanResult>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, url, raw_target, domain, source_context, verdict, confidence,
                signals, cache_hit, scanned_at
         FROM scan_results
         WHERE url = ?
         ORDER BY scanned_at DESC
         LIMIT 1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(parse_scan_from_row).transpose()
}

/// Count scans by outcome.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn stats(pool: &Pool<Sqlite>) -> Result<ScanStats, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN verdict = 'Scam' THEN 1 ELSE 0 END), 0) AS scams,
                COALESCE(SUM(CASE WHEN verdict = 'Suspicious' THEN 1 ELSE 0 END), 0) AS suspicious
         FROM scan_results",
    )
    .fetch_one(pool)
    .await?;

    let total_scans: i64 = row.try_get("total")?;
    let scam_detections: i64 = row.try_get("scams")?;
    let suspicious_detections: i64 = row.try_get("suspicious")?;

    #[allow(clippy::cast_precision_loss)]
    let detection_rate = if total_scans > 0 {
        scam_detections as f64 / total_scans as f64
    } else {
        0.0
    };

    Ok(ScanStats {
        total_scans,
        scam_detections,
        suspicious_detections,
        detection_rate,
    })
}

fn parse_scans_from_rows(rows: &[SqliteRow]) -> Result<Vec<ScanResult>, sqlx::Error> {
    rows.iter().map(parse_scan_from_row).collect()
}

fn parse_scan_from_row(row: &SqliteRow) -> Result<ScanResult, sqlx::Error> {
    let id_str: String = row.try_get("id")?;
    let url: String = row.try_get("url")?;
    let domain: Option<String> = row.try_get("domain")?;
    let verdict_str: String = row.try_get("verdict")?;
    let signals_json: String = row.try_get("signals")?;
    let scanned_at_str: String = row.try_get("scanned_at")?;

    let id = Uuid::parse_str(&id_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let signals: Vec<SignalResult> =
        serde_json::from_str(&signals_json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    // Unparseable submissions are stored without a domain
    let target = domain.and_then(|_| NormalizedTarget::parse(&url).ok());

    let computed_at = DateTime::parse_from_rfc3339(&scanned_at_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    Ok(ScanResult {
        id,
        raw_target: row.try_get("raw_target")?,
        target,
        source_context: row.try_get("source_context")?,
        verdict: Verdict::parse(&verdict_str),
        confidence: row.try_get("confidence")?,
        signals,
        computed_at,
        cache_hit: row.try_get("cache_hit")?,
    })
}
