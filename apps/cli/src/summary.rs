use std::{path::Path, time::Duration};

use console::style;
use tubepack_core::ProcessingReport;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Human-readable run summary on stdout.
pub fn print(report: &ProcessingReport, output_folder: &Path, elapsed: Duration) {
    if report.cancelled {
        println!("{} Cancelled", style("!").yellow().bold());
    }

    println!(
        "{} Transcripts: {} fetched, {} failed",
        style("✓").green().bold(),
        report.successful.len(),
        report.failed.len()
    );
    for failed in &report.failed {
        println!(
            "  {} {} {}",
            style("✗").red(),
            failed.title,
            style(format!("({}: {})", failed.id, failed.reason)).dim()
        );
    }

    if !report.output_files.is_empty() {
        println!(
            "{} Files written: {}",
            style("✓").green().bold(),
            report.output_files.len()
        );
        for artifact in &report.output_files {
            println!(
                "  {} {}",
                file_name(&artifact.file_path),
                style(format!(
                    "[{} videos, ~{} tokens]",
                    artifact.videos.len(),
                    artifact.token_count
                ))
                .dim()
            );
        }
    }

    for warning in &report.warnings {
        println!("{} {}", style("!").yellow().bold(), warning);
    }

    println!(
        "\n{} {}",
        style("Total time:").dim(),
        style(format_duration(elapsed)).cyan().bold()
    );
    if !report.output_files.is_empty() {
        println!(
            "{} {}\n",
            style("Saved:").dim(),
            style(output_folder.display()).cyan()
        );
    }
}
