//! Individual community reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteConnection};

/// One report filed against a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReport {
    /// Unique identifier
    pub id: String,
    /// Reported host, without a leading `www.`
    pub domain: String,
    /// Caller tag of the reporter (e.g. `cli`, `discord:1234`)
    pub reported_by: String,
    /// Free-text reason, if given
    pub reason: Option<String>,
    /// When the report was filed
    pub reported_at: DateTime<Utc>,
    /// Whether a reviewer has looked at it
    pub reviewed: bool,
}

/// Store a report.
///
/// # Errors
/// Returns `sqlx::Error` if the insert fails.
pub async fn insert_report(
    conn: &mut SqliteConnection,
    domain: &str,
    reported_by: &str,
    reason: Option<&str>,
) -> Result<UserReport, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let reported_at = Utc::now();

    sqlx::query(
        "INSERT INTO user_reports (id, domain, reported_by, reason, reported_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(domain)
    .bind(reported_by)
    .bind(reason)
    .bind(reported_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(UserReport {
        id,
        domain: domain.to_string(),
        reported_by: reported_by.to_string(),
        reason: reason.map(str::to_string),
        reported_at,
        reviewed: false,
    })
}

/// Reports for a domain, newest first.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn list_reports(pool: &Pool<Sqlite>, domain: &str) -> Result<Vec<UserReport>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, domain, reported_by, reason, reported_at, reviewed
         FROM user_reports
         WHERE domain = ?
         ORDER BY reported_at DESC",
    )
    .bind(domain)
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_report_from_row).collect()
}

fn parse_report_from_row(row: &SqliteRow) -> Result<UserReport, sqlx::Error> {
    let reported_at_str: String = row.try_get("reported_at")?;
    let reported_at = DateTime::parse_from_rfc3339(&reported_at_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    Ok(UserReport {
        id: row.try_get("id")?,
        domain: row.try_get("domain")?,
        reported_by: row.try_get("reported_by")?,
        reason: row.try_get("reason")?,
        reported_at,
        reviewed: row.try_get("reviewed")?,
    })
}
