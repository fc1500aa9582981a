//! Operator progress reporting.
//!
//! One overwriting status line on stderr: bytes moved, percentage and a bar.
//! Updates are O(1) and safe to call from the hot path of every read or
//! chunk; the line gets its final newline only on completion.

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

/// Builds the byte-transfer bar used by both upload paths.
pub fn transfer_bar(total_bytes: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(total_bytes);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {bytes}/{total_bytes} ({percent}%) [{bar:30}]")
            .unwrap()
            .progress_chars("█░ "),
    );
    bar.set_message(label.to_string());
    bar
}

/// Short human-readable byte count for status messages ("1.2 GiB").
pub fn format_bytes(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}
