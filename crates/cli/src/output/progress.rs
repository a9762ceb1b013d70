//! Progress bar for transfer operations
//!
//! Bridges core progress events to an indicatif bar. In quiet, JSON or
//! no-progress mode the bar is never drawn.

use s3h_core::{ProgressEvent, ProgressObserver};

use super::OutputConfig;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}";

/// Progress bar wrapper
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a byte progress bar; its length is updated from events
    pub fn new(config: &OutputConfig, label: &str) -> Self {
        let bar = config.progress_enabled().then(|| {
            let bar = indicatif::ProgressBar::new(0);
            let style = indicatif::ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar
        });

        Self { bar }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

impl ProgressObserver for ProgressBar {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(bar) = &self.bar {
            bar.set_length(event.bytes_total);
            bar.set_position(event.bytes_done);
            bar.set_message(format!(
                "{}/{} {}",
                event.items_done, event.items_total, event.current_item
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_quiet_mode() {
        let config = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        assert!(!ProgressBar::new(&config, "upload").is_visible());
    }

    #[test]
    fn test_progress_bar_json_mode() {
        let config = OutputConfig {
            json: true,
            ..Default::default()
        };
        assert!(!ProgressBar::new(&config, "upload").is_visible());
    }

    #[test]
    fn test_progress_bar_no_progress() {
        let config = OutputConfig {
            no_progress: true,
            ..Default::default()
        };
        assert!(!ProgressBar::new(&config, "upload").is_visible());
    }

    #[test]
    fn test_progress_bar_tracks_events() {
        let bar = ProgressBar::new(&OutputConfig::default(), "upload");
        assert!(bar.is_visible());
        bar.on_progress(&ProgressEvent {
            bytes_done: 5,
            bytes_total: 10,
            items_done: 1,
            items_total: 2,
            current_item: "a.txt".into(),
        });
        let inner = bar.bar.as_ref().unwrap();
        assert_eq!(inner.position(), 5);
        assert_eq!(inner.length(), Some(10));
        bar.finish_and_clear();
    }
}
