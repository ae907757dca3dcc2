//! Progress reporting for the streaming passes.

use indicatif::{ProgressBar, ProgressStyle};

/// Byte-driven progress bar for one pass over the edge file.
pub fn bytes_bar(total_size: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .expect("progress template is valid")
            .progress_chars("#>-"),
    );
    pb
}
