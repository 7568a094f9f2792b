//! Progress reporting for the long-running stages.
//!
//! Stages call [`Progress::report`] with `(completed, total, label)`. The
//! core never renders anything itself; hosts plug in a closure, a channel or
//! the tracing-backed reporter.

use std::sync::mpsc::Sender;
use std::sync::Mutex;

pub trait Progress: Sync {
    fn report(&self, completed: usize, total: usize, label: &str);
}

impl<F> Progress for F
where
    F: Fn(usize, usize, &str) + Sync,
{
    fn report(&self, completed: usize, total: usize, label: &str) {
        self(completed, total, label)
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&self, _completed: usize, _total: usize, _label: &str) {}
}

/// Emits reports as `debug!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn report(&self, completed: usize, total: usize, label: &str) {
        tracing::debug!(completed, total, "{}", label);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub label: String,
}

/// Forwards reports over an mpsc channel. A dropped receiver is ignored.
pub struct ChannelProgress {
    sender: Mutex<Sender<ProgressEvent>>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl Progress for ChannelProgress {
    fn report(&self, completed: usize, total: usize, label: &str) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(ProgressEvent {
                completed,
                total,
                label: label.to_string(),
            });
        }
    }
}
