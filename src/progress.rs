//! Progress bar for harvest runs.

use std::time::Duration;

use harvester_core::{HarvestObserver, ItemOutcome, PassOutcome};
use indicatif::{ProgressBar, ProgressStyle};

/// Returns true when an interactive progress bar should be drawn.
pub(crate) fn should_use_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

/// Drives an indicatif bar from harvest events. Hidden when disabled.
pub(crate) struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub(crate) fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{spinner} {prefix} [{bar:30}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl HarvestObserver for ProgressObserver {
    fn pass_started(&self, pass: u32, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(format!("pass {pass}"));
    }

    fn item_started(&self, _position: usize, _total: usize, identifier: &str) {
        self.bar.set_message(identifier.to_string());
    }

    fn item_finished(&self, _identifier: &str, _outcome: &ItemOutcome) {
        self.bar.inc(1);
    }

    fn pass_finished(&self, outcome: &PassOutcome) {
        self.bar.set_message(format!(
            "{} saved, {} failed",
            outcome.succeeded,
            outcome.failures.len()
        ));
    }
}
