//! Terminal output for the ftpsync CLI

use console::style;
use ftpsync_types::SyncStats;
use std::path::Path;
use std::time::Duration;

/// Announce what is being mirrored where
pub fn print_banner(local: &Path, address: &str, remote: &str) {
    println!(
        "{} Mirroring {} to {}{}",
        style("⟲").blue().bold(),
        style(local.display()).cyan(),
        style(address).cyan(),
        style(remote).cyan()
    );
}

/// Print counters gathered by a reconciliation pass or the sync loop
pub fn print_sync_stats(title: &str, stats: &SyncStats, duration: Duration) {
    println!();
    println!("{}", style(title).bold().underlined());
    println!(
        "  Uploaded: {} new, {} updated",
        style(stats.files_uploaded).green(),
        style(stats.files_updated).green()
    );
    println!("  Downloaded: {}", style(stats.files_downloaded).green());
    println!("  Unchanged: {}", style(stats.files_unchanged).dim());
    println!(
        "  Directories created: {} remote, {} local",
        style(stats.remote_dirs_created).green(),
        style(stats.local_dirs_created).green()
    );
    if stats.files_deleted > 0 || stats.dirs_deleted > 0 {
        println!(
            "  Deleted: {} files, {} directories",
            style(stats.files_deleted).yellow(),
            style(stats.dirs_deleted).yellow()
        );
    }
    println!(
        "  Transferred: {} up, {} down",
        style(format_bytes(stats.bytes_uploaded)).blue(),
        style(format_bytes(stats.bytes_downloaded)).blue()
    );
    println!(
        "  Failed: {}",
        if stats.failed > 0 {
            style(stats.failed).red()
        } else {
            style(stats.failed).green()
        }
    );
    println!("  Duration: {}", style(format_duration(duration)).blue());
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1023, "1023.00 B")]
    #[case(1024, "1.00 KB")]
    #[case(1536, "1.50 KB")]
    #[case(5 * 1024 * 1024, "5.00 MB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(125), "2m 5s")]
    #[case(Duration::from_secs(3725), "1h 2m 5s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }
}
