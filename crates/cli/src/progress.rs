//! Console rendering of batch events.

use std::io::{IsTerminal, Write};
use tokio::sync::mpsc;

use mediapress_core::report::{completion_line, format_megabytes};
use mediapress_core::BatchEvent;

/// Prints events until the channel closes.
///
/// Percentages are only drawn on a terminal, where `\r` can redraw the line.
pub async fn render(mut rx: mpsc::Receiver<BatchEvent>) {
    let interactive = std::io::stdout().is_terminal();
    let mut last_percent: Option<(usize, u32)> = None;

    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Discovered { total } => {
                println!("Found {} video(s) to process\n", total);
            }
            BatchEvent::JobStarted {
                index,
                total,
                file_name,
                input_size,
            } => {
                println!("[{}/{}] Processing: {}", index + 1, total, file_name);
                println!("  Original size: {}", format_megabytes(input_size));
            }
            BatchEvent::JobProgress {
                index,
                file_name,
                percent,
            } => {
                let rounded = percent.round() as u32;
                if interactive && last_percent != Some((index, rounded)) {
                    print!("  {}: {}%\r", file_name, rounded);
                    let _ = std::io::stdout().flush();
                    last_percent = Some((index, rounded));
                }
            }
            BatchEvent::JobSucceeded {
                file_name, result, ..
            } => {
                println!("  {}: {}", file_name, completion_line(&result));
            }
            BatchEvent::JobFailed {
                file_name, reason, ..
            } => {
                eprintln!("  Error processing {}: {}", file_name, reason);
            }
            BatchEvent::JobSkipped { file_name, .. } => {
                println!("  Skipped: {}", file_name);
            }
            BatchEvent::Finished { .. } => {
                println!();
            }
        }
    }
}
