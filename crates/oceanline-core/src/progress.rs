//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: a spinner line per dataset and a byte bar per file.
//! Non-TTY mode: hidden bars, logs carry progress instead.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Per-file progress bar (green bar, binary bytes)
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<28.dim} {bar:30.green/dim} {binary_bytes:>9}/{binary_total_bytes:9} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Pending style, shown until the response reports a content length
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<28.dim} {binary_bytes:>9} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Upgrade a progress bar from pending to a bytes bar once the total is known.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(bar_style());
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context with all bars hidden (tests, piped output).
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Create a per-file progress bar.
    ///
    /// Starts in pending style; `upgrade_to_bar` switches it to a byte bar.
    pub fn file_bar(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        pb.set_prefix(truncate_name(name, 28).to_string());
        pb
    }

    /// Create a dataset status line with a spinner.
    ///
    /// Update with `pb.set_message(...)`; call `pb.finish()` to stop the spinner.
    pub fn dataset_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<14.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether info-level logs are filtered out while bars are shown.
    pub fn hides_info(&self) -> bool {
        hides_info(self.is_tty, log::log_enabled!(log::Level::Info))
    }

    /// Status line at info level that stays visible in TTY mode.
    ///
    /// TTY mode logs at warn by default, so the line is printed above the
    /// bars there; otherwise it is logged.
    pub fn info(&self, msg: impl AsRef<str>) {
        if self.hides_info() {
            self.println(msg);
        } else {
            log::info!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

fn hides_info(is_tty: bool, info_enabled: bool) -> bool {
    is_tty && !info_enabled
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Keep the tail of long granule names, which carries the date and product.
fn truncate_name(name: &str, max: usize) -> &str {
    let len = name.chars().count();
    if len <= max {
        return name;
    }
    let skip = len - max;
    let start = name
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &name[start..]
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
