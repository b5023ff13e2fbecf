//! Sending IR codes

use crate::{
    driver::{CompletionSignal, DeviceHandle, Driver},
    format::CodeFormat,
};
use std::time::Duration;

/// How long a blocking transmit waits for the driver to report completion
pub const TRANSMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the completion event handed to the driver
pub const COMPLETION_SIGNAL_NAME: &str = "hUSBUIRTXAckEvent";

/// A code to transmit and how to send it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransmitRequest {
    /// The code text, passed to the driver unchanged
    pub code: String,
    pub format: CodeFormat,
    /// Number of times to repeat the code. For a two-piece code the first
    /// piece is sent once followed by the second piece `repeat_count`
    /// times
    pub repeat_count: u32,
    /// Wait until there has been no IR activity for this long before
    /// sending. Normally 0
    pub inactivity_wait_ms: u32,
    /// Wait for the driver to report the code has been sent
    pub blocking: bool,
}

impl TransmitRequest {
    /// A non-blocking Pronto transmit, sent once without waiting for
    /// inactivity
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            format: CodeFormat::PRONTO,
            repeat_count: 1,
            inactivity_wait_ms: 0,
            blocking: false,
        }
    }

    #[must_use]
    pub fn format(mut self, format: CodeFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn repeat_count(mut self, count: u32) -> Self {
        self.repeat_count = count;
        self
    }

    #[must_use]
    pub fn inactivity_wait_ms(mut self, ms: u32) -> Self {
        self.inactivity_wait_ms = ms;
        self
    }

    #[must_use]
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }
}

/// Send `request` through the driver. When blocking, returns `true` only
/// if the driver signalled completion within [`TRANSMIT_TIMEOUT`]; a
/// timeout looks the same as the driver refusing the code.
pub(crate) async fn transmit(
    driver: &dyn Driver,
    handle: DeviceHandle,
    request: &TransmitRequest,
) -> bool {
    // created per call and dropped on every return path below
    let done = request
        .blocking
        .then(|| CompletionSignal::new(COMPLETION_SIGNAL_NAME));

    let accepted = driver
        .transmit(
            handle,
            &request.code,
            request.format,
            request.repeat_count,
            request.inactivity_wait_ms,
            done.clone(),
        )
        .await;
    if !accepted {
        warn!("driver rejected transmit");
        return false;
    }

    let Some(done) = done else {
        return true;
    };
    if tokio::time::timeout(TRANSMIT_TIMEOUT, done.wait())
        .await
        .is_ok()
    {
        debug!("transmit complete");
        true
    } else {
        warn!(timeout = ?TRANSMIT_TIMEOUT, "timed out waiting for transmit");
        false
    }
}
