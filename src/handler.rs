//! Caller-supplied notification handlers.
//!
//! Both handlers are invoked directly from the driver's callback, which
//! may run on a thread owned by the driver rather than the thread that
//! connected or started learning. Handlers should return quickly and must
//! not call [`crate::Session::connect`] or [`crate::Session::disconnect`]
//! from inside a learn progress notification, as the learn call holds the
//! device handle until it returns.
//!
//! Closures implement both traits, as do unbounded `tokio` channel senders
//! for callers that would rather drain notifications on their own task.

use crate::learn::LearnProgress;
use tokio::sync::mpsc::UnboundedSender;

/// Receives IR codes picked up by the device while it is not learning
pub trait ReceiveHandler: Send + Sync {
    /// Called once per received code
    fn received(&self, code: &str);
}

impl<F> ReceiveHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn received(&self, code: &str) {
        self(code);
    }
}

impl ReceiveHandler for UnboundedSender<String> {
    fn received(&self, code: &str) {
        // a dropped receiver just means nobody is listening any more
        let _ = self.send(code.to_owned());
    }
}

/// Receives progress notifications while a code is being learned
pub trait ProgressHandler: Send + Sync {
    /// Called zero or more times per learn, in the order the driver
    /// reports them
    fn progress(&self, progress: LearnProgress);
}

impl<F> ProgressHandler for F
where
    F: Fn(LearnProgress) + Send + Sync,
{
    fn progress(&self, progress: LearnProgress) {
        self(progress);
    }
}

impl ProgressHandler for UnboundedSender<LearnProgress> {
    fn progress(&self, progress: LearnProgress) {
        let _ = self.send(progress);
    }
}
