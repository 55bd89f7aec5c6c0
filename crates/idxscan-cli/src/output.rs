//! Scan progress and report printing

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use console::style;
use idxscan_config::ReportConfig;
use idxscan_core::report::{self, Summary};
use idxscan_core::{FileOutcome, ScanOptions, ScanSession, ScanStats, Scanner};
use indicatif::{ProgressBar, ProgressStyle};

/// Run the scan with a spinner on stderr. Blocks until all workers finish.
pub fn run_scan(
    root: &Path,
    session: &ScanSession,
    options: ScanOptions,
) -> idxscan_core::Result<ScanStats> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {pos} index files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(80));

    let result = Scanner::new(options).scan_with_progress(root, session, |outcome| {
        pb.inc(1);
        if let FileOutcome::Indexed { path, .. } = outcome {
            pb.set_message(path.display().to_string());
        }
    });

    pb.finish_and_clear();
    result
}

/// Each failing file was already logged as a warning while scanning.
pub fn print_failures(stats: &ScanStats) {
    if stats.files_failed > 0 {
        eprintln!(
            "{} {} of {} index files could not be read",
            style("Warning:").yellow(),
            stats.files_failed,
            stats.files_queued
        );
    }
}

/// Print the configured reports to stdout. The summary is always printed.
pub fn print_reports(session: &ScanSession, config: &ReportConfig) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let reg = session.read();

    if config.top_chunks > 0 {
        let rows = reg.digests.top_by_reference_count(config.top_chunks);
        report::write_occurrences(&mut out, config.top_chunks, &rows)?;
    }
    if config.print_refs {
        report::write_references(&mut out, &reg)?;
    }
    if config.top_files > 0 {
        let rows = reg.files.top_by_dedup_ratio(config.top_files);
        report::write_dedup(&mut out, config.top_files, &rows)?;
    }
    report::write_summary(&mut out, &Summary::of(&reg))?;
    out.flush()
}
