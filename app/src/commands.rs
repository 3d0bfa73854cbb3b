//! Subcommand handlers.
//!
//! Each handler prints either a human-readable summary or, with `--json`,
//! one JSON document per result.

use anyhow::Context;
use athlethia_core::{NormalizedTarget, ScamRecord, ScanReport, ScanRequest, SignalStatus};
use athlethia_db::Database;
use athlethia_detector::ScanOrchestrator;
use futures::future::join_all;
use serde::Serialize;
use std::fmt::Write;

/// Scan each target and print its report.
pub async fn scan(
    orchestrator: &ScanOrchestrator,
    targets: &[String],
    source: &str,
    json: bool,
) -> anyhow::Result<()> {
    let results = join_all(
        targets
            .iter()
            .map(|target| orchestrator.scan(ScanRequest::new(target.clone(), source))),
    )
    .await;

    for result in results {
        let report = result.to_report();
        if json {
            print_json(&report)?;
        } else {
            println!("{}", render_report(&report));
        }
    }
    Ok(())
}

/// File a community report.
pub async fn report(
    orchestrator: &ScanOrchestrator,
    target: &str,
    reporter: &str,
    json: bool,
) -> anyhow::Result<()> {
    let record = orchestrator
        .report(target, reporter)
        .await
        .with_context(|| format!("failed to report {target}"))?;
    print_record(&record, json)
}

/// Mark the host of a link (without `www.`) as a confirmed scam.
pub async fn confirm(db: &Database, target: &str, scam_type: &str, json: bool) -> anyhow::Result<()> {
    let domain = report_domain(target)?;
    let record = db
        .confirm_scam(&domain, scam_type)
        .await
        .with_context(|| format!("failed to confirm {domain}"))?;
    print_record(&record, json)
}

/// Print detection statistics.
pub async fn stats(db: &Database, json: bool) -> anyhow::Result<()> {
    let stats = db.stats().await.context("failed to read statistics")?;
    if json {
        return print_json(&stats);
    }
    println!("Total scans:            {}", stats.total_scans);
    println!("Scam detections:        {}", stats.scam_detections);
    println!("Suspicious detections:  {}", stats.suspicious_detections);
    println!("Detection rate:         {:.1}%", stats.detection_rate * 100.0);
    Ok(())
}

/// Print recent scans, or the latest scan of one link.
pub async fn history(db: &Database, limit: u32, url: Option<&str>, json: bool) -> anyhow::Result<()> {
    let scans = match url {
        Some(url) => {
            let canonical = NormalizedTarget::parse(url)
                .map_or_else(|_| url.trim().to_string(), |t| t.as_str().to_string());
            db.latest_scan_for(&canonical)
                .await
                .context("failed to read scan history")?
                .into_iter()
                .collect()
        }
        None => db
            .recent_scans(limit)
            .await
            .context("failed to read scan history")?,
    };

    if json {
        let reports: Vec<ScanReport> = scans.iter().map(|s| s.to_report()).collect();
        return print_json(&reports);
    }
    if scans.is_empty() {
        println!("No scans recorded");
    }
    for scan in &scans {
        println!(
            "{}  {:<10} {:.2}  {}",
            scan.computed_at.format("%Y-%m-%d %H:%M:%S"),
            scan.verdict.to_string(),
            scan.confidence,
            scan.target_str()
        );
    }
    Ok(())
}

/// Print the reports filed against the host of a link.
pub async fn reports(db: &Database, target: &str, json: bool) -> anyhow::Result<()> {
    let domain = report_domain(target)?;
    let reports = db
        .list_reports(&domain)
        .await
        .context("failed to read reports")?;
    if json {
        return print_json(&reports);
    }
    if reports.is_empty() {
        println!("No reports for {domain}");
    }
    for report in &reports {
        println!(
            "{}  {}  {}",
            report.reported_at.format("%Y-%m-%d %H:%M:%S"),
            report.reported_by,
            report.reason.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn report_domain(target: &str) -> anyhow::Result<String> {
    let target =
        NormalizedTarget::parse(target).with_context(|| format!("not a valid link: {target}"))?;
    Ok(target.report_domain().to_string())
}

fn print_record(record: &ScamRecord, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(record);
    }
    println!(
        "{}: {} report(s), {}{}",
        record.domain,
        record.report_count,
        if record.confirmed { "confirmed" } else { "unconfirmed" },
        record
            .scam_type
            .as_deref()
            .map(|t| format!(" ({t})"))
            .unwrap_or_default()
    );
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Human-readable rendering of a scan report.
#[must_use]
pub fn render_report(report: &ScanReport) -> String {
    let mut out = format!(
        "{}\n  Verdict: {} ({:.0}% confidence)\n",
        report.target,
        report.verdict,
        report.confidence * 100.0
    );
    for line in &report.evidence {
        out.push_str("  - ");
        out.push_str(line);
        out.push('\n');
    }
    for signal in &report.breakdown {
        let score = signal
            .score
            .map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
        let status = match signal.status {
            SignalStatus::Completed => String::new(),
            other => format!(" [{other}]"),
        };
        let cached = if signal.cache_hit { " (cached)" } else { "" };
        let _ = writeln!(
            out,
            "  {:<22} {score}{status}{cached}",
            signal.analyzer.display_name()
        );
    }
    out
}
