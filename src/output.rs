use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;

use crate::headers::SecurityHeaderAuditor;
use crate::models::ScanResult;

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", total_secs * 1000.0)
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0).floor() as u64;
        let secs = total_secs % 60.0;
        format!("{}m {:.2}s", mins, secs)
    }
}

fn score_label(score: u8) -> ColoredString {
    let text = format!("{}/100", score);
    match score {
        80..=100 => text.green().bold(),
        50..=79 => text.yellow().bold(),
        _ => text.red().bold(),
    }
}

pub fn print_divider() {
    println!("{}", "    ─────────────────────────────────────".dimmed());
}

/// Human-readable summary of one result.
pub fn print_result(result: &ScanResult, auditor: &SecurityHeaderAuditor) {
    println!();
    println!("    {} {}", "Target:".bold(), result.url.cyan());

    if !result.is_reachable() {
        println!(
            "    {} {}",
            "✗".red().bold(),
            result.error.as_deref().unwrap_or("unreachable").red()
        );
        println!("    {} {}", "Score:".bold(), score_label(result.security_score));
        print_divider();
        return;
    }

    println!(
        "    HTTP {} | {} forms | {}",
        result.http_status,
        result.forms_found,
        format_duration(result.duration).dimmed()
    );

    if !result.technologies.is_empty() {
        let tech: Vec<&str> = result.technologies.iter().map(String::as_str).collect();
        println!("    {} {}", "Tech:".bold(), tech.join(", "));
    }

    match (result.tls_info.valid, &result.tls_info.certificate) {
        (true, Some(cert)) => println!(
            "    {} {} {} | expires in {} days",
            "TLS:".bold(),
            result.tls_info.protocol.as_deref().unwrap_or("?"),
            result.tls_info.cipher.as_deref().unwrap_or("?"),
            cert.days_until_expiry
        ),
        _ => println!(
            "    {} {}",
            "TLS:".bold(),
            result.tls_info.error.as_deref().unwrap_or("invalid").dimmed()
        ),
    }

    let missing = auditor.findings(&result.url, &result.security_headers);
    for header in missing.as_slice() {
        println!(
            "    {} [{}] missing {}",
            "⚠".yellow(),
            header.severity.label(),
            header.evidence.get("header").map(String::as_str).unwrap_or("?")
        );
    }

    let mut vulns: Vec<_> = result.vulnerabilities.iter().collect();
    vulns.sort_by(|a, b| b.severity.cmp(&a.severity));
    for v in vulns {
        let detail = v
            .evidence
            .iter()
            .map(|(k, val)| format!("{}={}", k, val))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "    {} [{}] {} {} {}",
            "✗".red().bold(),
            v.severity.label(),
            v.category.code().bold(),
            v.target_url,
            detail.dimmed()
        );
    }

    println!("    {} {}", "Score:".bold(), score_label(result.security_score));
    print_divider();
}

pub fn write_json(path: &Path, results: &[ScanResult]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, results).context("Failed to serialize scan results")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
