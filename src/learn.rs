//! Learning IR codes from an unknown remote

use crate::{
    driver::{AbortFlag, DeviceHandle, Driver, ProgressBridge},
    format::CodeFormat,
};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;

/// Size of the scratch buffer a learned code is written into. Large
/// enough for the longest code the device can learn
pub const LEARN_BUFFER_LEN: usize = 32 * 1024;

/// One progress notification from the driver during a learn
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LearnProgress {
    /// Percentage of the code captured so far
    pub progress_percent: u32,
    /// Quality of the received signal, 0-100
    pub signal_quality: u32,
    /// Measured carrier frequency
    pub carrier_frequency_hz: u64,
}

/// Parameters for a learn
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LearnRequest {
    /// Format to capture the code in, optionally combined with learn
    /// modifiers
    pub format: CodeFormat,
    /// Only accept this carrier frequency; 0 detects it automatically
    pub forced_frequency_hz: u32,
}

impl Default for LearnRequest {
    fn default() -> Self {
        Self {
            format: CodeFormat::PRONTO,
            forced_frequency_hz: 0,
        }
    }
}

impl LearnRequest {
    /// Learn in `format` with the carrier frequency auto-detected
    pub const fn new(format: CodeFormat) -> Self {
        Self {
            format,
            forced_frequency_hz: 0,
        }
    }

    #[must_use]
    pub fn forced_frequency_hz(mut self, hz: u32) -> Self {
        self.forced_frequency_hz = hz;
        self
    }
}

/// How a learn call ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LearnOutcome {
    /// The learned code
    Completed(String),
    /// [`crate::Session::abort_learn`] was called and the driver gave up
    Aborted,
    /// The driver reported a failure
    Failed,
    /// Not connected, or another learn was already in progress
    Declined,
}

impl LearnOutcome {
    /// The learned code, if any. Aborted, failed and declined learns are
    /// all `None`
    pub fn into_code(self) -> Option<String> {
        match self {
            Self::Completed(code) => Some(code),
            Self::Aborted | Self::Failed | Self::Declined => None,
        }
    }
}

/// Nobody is learning
const IDLE: u8 = 0;
/// A learn has claimed the controller but not yet cleared the abort flag
const STARTING: u8 = 1;
/// A learn is running and will see any abort from here on
const LEARNING: u8 = 2;

/// Serialises learns on one session and owns the state they share
pub(crate) struct LearnController {
    state: AtomicU8,
    abort: AbortFlag,
    /// Reused across learns; only ever locked by the holder of a
    /// [`Learning`] guard
    buffer: Mutex<Box<[u8]>>,
    progress: ProgressBridge,
}

/// Claim on the controller for one learn. Returns it to idle however the
/// learn ends, including when the learning future is dropped
pub(crate) struct Learning<'a>(&'a LearnController);

impl Drop for Learning<'_> {
    fn drop(&mut self) {
        self.0.state.store(IDLE, Ordering::Release);
        debug!("learn state -> idle");
    }
}

impl LearnController {
    pub(crate) fn new(buffer_len: usize, progress: ProgressBridge) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            abort: AbortFlag::default(),
            buffer: Mutex::new(vec![0; buffer_len].into_boxed_slice()),
            progress,
        }
    }

    /// True once a learn has started and will observe an abort
    pub(crate) fn is_learning(&self) -> bool {
        self.state.load(Ordering::Acquire) == LEARNING
    }

    pub(crate) fn abort(&self) {
        debug!(learning = self.is_learning(), "abort requested");
        self.abort.set();
    }

    /// Claim the controller, or `None` if another learn holds it. Never
    /// waits, so losing callers are turned away straight away
    pub(crate) fn begin(&self) -> Option<Learning<'_>> {
        self.state
            .compare_exchange(
                IDLE,
                STARTING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;
        let learning = Learning(self);
        self.abort.reset();
        self.state.store(LEARNING, Ordering::Release);
        Some(learning)
    }

    /// Run the learn claimed by `learning` through the driver
    pub(crate) async fn learn(
        &self,
        learning: Learning<'_>,
        driver: &dyn Driver,
        handle: DeviceHandle,
        request: LearnRequest,
    ) -> LearnOutcome {
        debug_assert!(std::ptr::eq(learning.0, self));
        debug!(?request, "learn state -> learning");

        let mut buf = self.buffer.lock().await;
        // don't hand back the previous code if the driver writes nothing
        if let Some(first) = buf.first_mut() {
            *first = 0;
        }

        let ok = driver
            .learn(
                handle,
                request.format,
                &mut buf,
                &self.progress,
                &self.abort,
                request.forced_frequency_hz,
            )
            .await;

        let outcome = if ok {
            LearnOutcome::Completed(decode_code(&buf))
        } else if self.abort.is_set() {
            LearnOutcome::Aborted
        } else {
            warn!("driver failed to learn code");
            LearnOutcome::Failed
        };
        debug!(?outcome, "learn finished");
        drop(buf);
        drop(learning);
        outcome
    }
}

/// Read the NUL-terminated text the driver wrote into `buf`
fn decode_code(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
