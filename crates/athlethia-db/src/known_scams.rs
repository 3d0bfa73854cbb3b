//! Community scam database.
//!
//! `known_scams` holds one row per reported domain. Reports increment
//! `reported_count`; a reviewer sets `verified` through [`confirm_scam`].

use athlethia_core::ScamRecord;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Pool, Row, Sqlite, SqliteConnection};

/// Category recorded for domains that only have community reports.
pub const USER_REPORTED: &str = "user_reported";

/// Look up a domain.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn lookup<'e, E>(executor: E, domain: &str) -> Result<Option<ScamRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT domain, scam_type, reported_count, first_reported, verified
         FROM known_scams WHERE domain = ?",
    )
    .bind(domain)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(parse_record_from_row).transpose()
}

/// Count one more report against `domain`, creating the record if needed.
///
/// Takes a connection so it can share a transaction with the report row.
///
/// # Errors
/// Returns `sqlx::Error` if the upsert fails.
pub async fn upsert_report(
    conn: &mut SqliteConnection,
    domain: &str,
) -> Result<ScamRecord, sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO known_scams (domain, scam_type, reported_count, first_reported, last_reported)
         VALUES (?, ?, 1, ?, ?)
         ON CONFLICT(domain) DO UPDATE SET
             reported_count = reported_count + 1,
             last_reported = excluded.last_reported",
    )
    .bind(domain)
    .bind(USER_REPORTED)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    lookup(&mut *conn, domain)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Mark a domain as a reviewer-confirmed scam.
///
/// Creates the record when the domain was never reported.
///
/// # Errors
/// Returns `sqlx::Error` if the upsert fails.
pub async fn confirm_scam(
    pool: &Pool<Sqlite>,
    domain: &str,
    scam_type: &str,
) -> Result<ScamRecord, sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO known_scams (domain, scam_type, reported_count, first_reported, last_reported, verified)
         VALUES (?, ?, 0, ?, ?, 1)
         ON CONFLICT(domain) DO UPDATE SET
             scam_type = excluded.scam_type,
             verified = 1",
    )
    .bind(domain)
    .bind(scam_type)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!("Confirmed {} as {}", domain, scam_type);

    lookup(pool, domain)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

fn parse_record_from_row(row: &SqliteRow) -> Result<ScamRecord, sqlx::Error> {
    let first_reported_str: String = row.try_get("first_reported")?;
    let reported_count: i64 = row.try_get("reported_count")?;

    let first_seen = DateTime::parse_from_rfc3339(&first_reported_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    Ok(ScamRecord {
        domain: row.try_get("domain")?,
        report_count: u32::try_from(reported_count).unwrap_or(u32::MAX),
        first_seen,
        confirmed: row.try_get("verified")?,
        scam_type: row.try_get("scam_type")?,
    })
}
