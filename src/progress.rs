//! Progress reporting infrastructure

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::borrow::Cow;

/// CLI progress report of ongoing operations
///
/// To avoid corrupted terminal output, you should not write anything to stdout
/// or stderr yourself as long as a report is being displayed. Please use logs
/// for debug messages.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Prepare to report progress on the cli
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare to report on a new operation
    pub fn add(
        &self,
        what: impl Into<Cow<'static, str>>,
        config: ProgressConfig,
    ) -> ProgressTracker {
        let ProgressConfig {
            work,
            show_rate_eta,
        } = config;
        let bar = ProgressBar::new(work.into()).with_prefix(what);
        let style_header = "{prefix} {wide_bar} ";
        let style_trailer = match (work, show_rate_eta) {
            (Work::Steps(_), false) => "{pos}/{len}",
            (Work::Steps(_), true) => "{pos}/{len} ({per_sec})",
            (Work::Bytes(_), false) => "{decimal_bytes}/{decimal_total_bytes}",
            (Work::Bytes(_), true) => {
                "{decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec}, ~{eta} left)"
            }
        };
        let bar = bar.with_style(
            ProgressStyle::with_template(&format!("{style_header}{style_trailer}"))
                .expect("all styles above should be valid indicatif styles"),
        );
        ProgressTracker {
            bar: self.0.add(bar),
            report: self.0.clone(),
        }
    }
}

/// Progress bar configuration
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgressConfig {
    /// Length of the progress bar
    work: Work,

    /// Show the completion rate and estimated remaining time
    show_rate_eta: bool,
}
//
impl ProgressConfig {
    /// Default configuration, for some amount of work
    pub fn new(work: Work) -> Self {
        Self {
            work,
            show_rate_eta: true,
        }
    }

    /// Disable display of the completion rate and remaining time
    pub fn dont_show_rate_eta(self) -> Self {
        Self {
            show_rate_eta: false,
            ..self
        }
    }
}

/// Work whose progression can be tracked
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Work {
    /// Steps to be taken
    Steps(usize),

    /// Bytes to be processed
    Bytes(u64),
}
//
impl From<Work> for u64 {
    fn from(value: Work) -> Self {
        match value {
            Work::Steps(s) => s as u64,
            Work::Bytes(b) => b,
        }
    }
}

/// Mechanism to track progress
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Progress bar for this specific operation
    bar: ProgressBar,

    /// Underlying process report
    report: MultiProgress,
}
//
impl ProgressTracker {
    /// Show that a certain amount of progress has been made
    ///
    /// Returns truth that the progress bar has reached its maximum value, in
    /// which case it is removed from the report.
    pub fn make_progress(&self, progress: u64) -> bool {
        // Track progress, servers may send more than they announced
        self.bar.inc(progress);
        let current = self.bar.position();
        let max = self.bar.length().unwrap_or(0);
        if current > max {
            log::debug!("Recorded {current} units of progress out of an expected {max}");
        }

        // Hide progress bar once done
        let finished = current >= max;
        if finished && !self.bar.is_finished() {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
        finished
    }
}
