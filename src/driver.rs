//! Abstraction over the vendor driver (`uuirtdrv`) so that the session
//! logic can run against the real library or against [`mock::MockDriver`]

use crate::{
    format::CodeFormat,
    handler::{ProgressHandler, ReceiveHandler},
    learn::LearnProgress,
    system::RawInfo,
};
use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

pub mod mock;

/// Opaque handle to an open device, as returned by [`Driver::open`]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    /// Wrap the raw value the driver handed out
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw value to hand back to the driver
    pub const fn raw(self) -> usize {
        self.0
    }
}

/// The driver entry points the session is built on. Every method maps to
/// one native call; none of them retry.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Version of the installed driver, or `None` if it cannot be queried
    async fn driver_version(&self) -> Option<u32>;

    /// Open the device. On failure returns the driver's last-error code
    async fn open(&self) -> std::result::Result<DeviceHandle, u32>;

    /// Close a handle previously returned by [`Driver::open`]
    async fn close(&self, handle: DeviceHandle) -> bool;

    /// Read the firmware info block
    async fn info(&self, handle: DeviceHandle) -> Option<RawInfo>;

    /// Read the config flag word
    async fn config(&self, handle: DeviceHandle) -> Option<u32>;

    /// Replace the config flag word
    async fn set_config(&self, handle: DeviceHandle, flags: u32) -> bool;

    /// Register the bridge that codes received while idle are passed to
    async fn set_receive_callback(
        &self,
        handle: DeviceHandle,
        bridge: ReceiveBridge,
    ) -> bool;

    /// Start transmitting `code`. When `done` is provided the driver must
    /// call [`CompletionSignal::signal`] once the code has been sent,
    /// possibly after this call has already returned.
    async fn transmit(
        &self,
        handle: DeviceHandle,
        code: &str,
        format: CodeFormat,
        repeat_count: u32,
        inactivity_wait_ms: u32,
        done: Option<CompletionSignal>,
    ) -> bool;

    /// Learn a code into `buf` as NUL-terminated text. Returns once a
    /// code has been captured, learning failed, or `abort` was observed.
    async fn learn(
        &self,
        handle: DeviceHandle,
        format: CodeFormat,
        buf: &mut [u8],
        progress: &ProgressBridge,
        abort: &AbortFlag,
        forced_frequency_hz: u32,
    ) -> bool;
}

/// Carries received codes from the driver's callback to the caller's
/// [`ReceiveHandler`]
#[derive(Clone)]
pub struct ReceiveBridge {
    handler: Arc<dyn ReceiveHandler>,
}

impl ReceiveBridge {
    pub(crate) fn new(handler: Arc<dyn ReceiveHandler>) -> Self {
        Self { handler }
    }

    /// Forward a received code. May be called from any thread
    pub fn deliver(&self, code: &str) {
        trace!(code, "IR code received");
        self.handler.received(code);
    }
}

impl Debug for ReceiveBridge {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.debug_struct("ReceiveBridge").finish_non_exhaustive()
    }
}

/// Carries learn progress from the driver's callback to the caller's
/// [`ProgressHandler`]
#[derive(Clone)]
pub struct ProgressBridge {
    handler: Arc<dyn ProgressHandler>,
}

impl ProgressBridge {
    pub(crate) fn new(handler: Arc<dyn ProgressHandler>) -> Self {
        Self { handler }
    }

    /// Forward one progress notification verbatim. May be called from
    /// any thread
    pub fn report(
        &self,
        progress_percent: u32,
        signal_quality: u32,
        carrier_frequency_hz: u64,
    ) {
        let progress = LearnProgress {
            progress_percent,
            signal_quality,
            carrier_frequency_hz,
        };
        trace!(?progress, "learn progress");
        self.handler.progress(progress);
    }
}

impl Debug for ProgressBridge {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.debug_struct("ProgressBridge").finish_non_exhaustive()
    }
}

/// Cooperative cancellation flag shared with the driver during a learn.
/// The driver polls it at its own granularity.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Whether an abort has been requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Auto-reset completion event for a blocking transmit: starts unset, and
/// each [`CompletionSignal::signal`] releases exactly one wait.
#[derive(Clone, Debug)]
pub struct CompletionSignal {
    name: &'static str,
    event: Arc<Notify>,
}

impl CompletionSignal {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            event: Arc::new(Notify::new()),
        }
    }

    /// Name the platform event should be created under
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Mark the transmission as complete. May be called from any thread,
    /// before or after the session starts waiting
    pub fn signal(&self) {
        self.event.notify_one();
    }

    pub(crate) async fn wait(&self) {
        self.event.notified().await;
    }
}
