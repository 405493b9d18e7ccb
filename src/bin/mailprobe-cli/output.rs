use anyhow::Result;
use mailprobe::{MxRecord, VerificationReport};

use crate::args::OutputFormat;

pub fn write_reports(
    reports: &[VerificationReport],
    format: OutputFormat,
    transcript: bool,
) -> Result<()> {
    match format {
        OutputFormat::Human => {
            for report in reports {
                for line in human_lines(report, transcript) {
                    println!("{line}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reports)?),
        OutputFormat::Ndjson => {
            for report in reports {
                println!("{}", serde_json::to_string(report)?);
            }
        }
    }
    Ok(())
}

pub fn write_mx(domain: &str, records: &[MxRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human if records.is_empty() => println!("{domain}: no MX records"),
        OutputFormat::Human => {
            for record in records {
                println!("{domain}\t{}\t{}", record.preference, record.exchange);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Ndjson => {
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
    }
    Ok(())
}

pub fn any_invalid(reports: &[VerificationReport]) -> bool {
    reports.iter().any(|report| !report.verdict.valid())
}

fn human_lines(report: &VerificationReport, transcript: bool) -> Vec<String> {
    let reason = report.verdict.reason();
    let tag = if report.verdict.valid() { "[OK]     " } else { "[INVALID]" };
    let mut lines = vec![format!(
        "{tag} {} :: {reason} ({})",
        report.email,
        reason.description()
    )];

    if !report.mx_records.is_empty() {
        let mx = report
            .mx_records
            .iter()
            .map(|record| format!("{} {}", record.preference, record.exchange))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("          mx: {mx}"));
    }

    if let Some(probe) = &report.probe {
        let tried = if probe.mx_tried.is_empty() {
            "-".to_string()
        } else {
            probe.mx_tried.join(", ")
        };
        lines.push(format!("          smtp: {} via {tried}", probe.outcome));
        if transcript {
            lines.extend(probe.transcript.iter().map(|line| format!("            {line}")));
        }
    }
    lines
}
