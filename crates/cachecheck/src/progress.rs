//! # Progress Reporting
//!
//! The checker pushes a percentage and a status line to a [`ProgressSink`]
//! and polls it for cancellation. Sinks are best-effort: nothing they do can
//! fail a run. A sink that panics is logged and ignored; a panicking
//! cancellation check reads as "not canceled".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

/// Receiver of progress updates for a running check.
pub trait ProgressSink: Send + Sync {
    /// Report `percent` (0-100) with a status line.
    fn update(&self, percent: u8, message: &str);

    /// Polled between updates; `true` stops the run early.
    fn is_canceled(&self) -> bool;
}

/// Discards updates and is never canceled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _percent: u8, _message: &str) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Terminal progress bar sink.
///
/// The run is considered canceled once [`CancelHandle::cancel`] is called or
/// the bar has been finished from elsewhere.
#[derive(Clone)]
pub struct ProgressBarSink {
    bar: ProgressBar,
    cancel: CancelHandle,
}

impl ProgressBarSink {
    pub fn new(title: impl Into<String>) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_prefix(title.into());
        Self::with_bar(bar)
    }

    /// A sink that tracks state without drawing anything.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ProgressBarSink {
    fn update(&self, percent: u8, message: &str) {
        self.bar.set_position(u64::from(percent.min(100)));
        self.bar.set_message(message.to_string());
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_canceled() || self.bar.is_finished()
    }
}
