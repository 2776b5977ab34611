use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Steadily ticking spinner for a request of unknown length.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    match ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        Ok(style) => pb.set_style(style),
        Err(e) => log::debug!("Spinner template rejected: {}", e),
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
