//! Console progress for the long running phases.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// A spinner for one phase.
pub struct Phase {
    bar: ProgressBar,
    label: String,
}

impl Phase {
    /// Start a spinner labelled `label` and log the phase.
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(label.clone());
        info!("{}", label);
        Self { bar, label }
    }

    /// `matched` relevant entities out of `seen`.
    pub fn update(&self, matched: u64, seen: u64) {
        self.bar
            .set_message(format!("{} {}/{}", self.label, matched, seen));
        self.bar.tick();
    }

    /// Show a single running count.
    pub fn count(&self, count: u64) {
        self.bar.set_message(format!("{} {}", self.label, count));
        self.bar.tick();
    }

    /// Clear the spinner and log `summary` after the label.
    pub fn finish(self, summary: impl AsRef<str>) {
        self.bar.finish_and_clear();
        info!("{} {}", self.label, summary.as_ref());
    }
}
