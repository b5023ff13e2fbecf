//! Scriptable in-memory [`Driver`] for tests and hardware-free
//! development.
//!
//! Behaviour is configured through `&self` setters so a test can change it
//! while a session is using the driver, and every call is counted so tests
//! can check what reached the driver.

use super::{
    AbortFlag, CompletionSignal, DeviceHandle, Driver, ProgressBridge,
    ReceiveBridge,
};
use crate::{format::CodeFormat, learn::LearnProgress, system::RawInfo};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

/// How often a held learn checks the abort flag
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// When a blocking transmit reports completion
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Completion {
    /// Signal before `transmit` returns
    #[default]
    Immediate,
    /// Signal from a driver thread after the delay
    After(Duration),
    /// Never signal
    Never,
}

/// What a call to [`Driver::learn`] does
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LearnScript {
    /// Progress reported, in order, each from a separate driver thread
    pub progress: Vec<LearnProgress>,
    /// After reporting progress, wait until the abort flag is set and then
    /// fail
    pub hold_until_abort: bool,
    /// Code written to the buffer on success; `None` fails the learn
    pub code: Option<String>,
}

impl Default for LearnScript {
    fn default() -> Self {
        Self {
            progress: Vec::new(),
            hold_until_abort: false,
            code: Some(String::new()),
        }
    }
}

impl LearnScript {
    /// Report `progress` then succeed with `code`
    pub fn completes(
        progress: impl IntoIterator<Item = (u32, u32, u64)>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            progress: progress
                .into_iter()
                .map(|(progress_percent, signal_quality, carrier_frequency_hz)| {
                    LearnProgress {
                        progress_percent,
                        signal_quality,
                        carrier_frequency_hz,
                    }
                })
                .collect(),
            hold_until_abort: false,
            code: Some(code.into()),
        }
    }

    /// Block until aborted
    pub fn until_aborted() -> Self {
        Self {
            progress: Vec::new(),
            hold_until_abort: true,
            code: None,
        }
    }

    /// Fail straight away
    pub fn fails() -> Self {
        Self {
            progress: Vec::new(),
            hold_until_abort: false,
            code: None,
        }
    }
}

/// A transmit as it reached the driver
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TransmitCall {
    pub code: String,
    pub format: CodeFormat,
    pub repeat_count: u32,
    pub inactivity_wait_ms: u32,
    /// Whether a completion signal was passed
    pub blocking: bool,
}

#[derive(Debug)]
struct State {
    version: Option<u32>,
    open_error: Option<u32>,
    next_handle: usize,
    open: Option<DeviceHandle>,
    close_result: bool,
    receive_callback_result: bool,
    receive: Option<ReceiveBridge>,
    info: Option<RawInfo>,
    config: u32,
    config_writes: Vec<u32>,
    transmit_result: bool,
    completion: Completion,
    transmits: Vec<TransmitCall>,
    learn: LearnScript,
    learn_requests: Vec<(CodeFormat, u32)>,
}

/// In-memory stand-in for the USB-UIRT driver
#[derive(Debug)]
pub struct MockDriver {
    state: Mutex<State>,
    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver whose device opens, reports firmware 1.0 and accepts
    /// every call
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                version: Some(0x0100),
                open_error: None,
                next_handle: 1,
                open: None,
                close_result: true,
                receive_callback_result: true,
                receive: None,
                info: Some(RawInfo {
                    fw_version: 0x0100,
                    prot_version: 0x0100,
                    fw_date_day: 1,
                    fw_date_month: 1,
                    fw_date_year: 0,
                }),
                config: 0,
                config_writes: Vec::new(),
                transmit_result: true,
                completion: Completion::Immediate,
                transmits: Vec::new(),
                learn: LearnScript::default(),
                learn_requests: Vec::new(),
            }),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Version reported by [`Driver::driver_version`]
    pub fn set_version(&self, version: Option<u32>) {
        self.state().version = version;
    }

    /// Make `open` fail with `code`, or succeed again with `None`
    pub fn set_open_error(&self, code: Option<u32>) {
        self.state().open_error = code;
    }

    pub fn set_close_result(&self, ok: bool) {
        self.state().close_result = ok;
    }

    pub fn set_receive_callback_result(&self, ok: bool) {
        self.state().receive_callback_result = ok;
    }

    /// Info block returned by [`Driver::info`]; `None` fails the call
    pub fn set_info(&self, info: Option<RawInfo>) {
        self.state().info = info;
    }

    /// Flag word currently stored on the "device"
    pub fn set_config_bits(&self, bits: u32) {
        self.state().config = bits;
    }

    pub fn config_bits(&self) -> u32 {
        self.state().config
    }

    /// Every value written through [`Driver::set_config`]
    pub fn config_writes(&self) -> Vec<u32> {
        self.state().config_writes.clone()
    }

    pub fn set_transmit_result(&self, ok: bool) {
        self.state().transmit_result = ok;
    }

    pub fn set_completion(&self, completion: Completion) {
        self.state().completion = completion;
    }

    pub fn transmits(&self) -> Vec<TransmitCall> {
        self.state().transmits.clone()
    }

    pub fn set_learn_script(&self, script: LearnScript) {
        self.state().learn = script;
    }

    /// Format and forced frequency of every learn that reached the driver
    pub fn learn_requests(&self) -> Vec<(CodeFormat, u32)> {
        self.state().learn_requests.clone()
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Handle of the currently open device, if any
    pub fn open_handle(&self) -> Option<DeviceHandle> {
        self.state().open
    }

    /// Deliver `code` through the installed receive bridge, as the driver
    /// would from its own thread. Returns `false` if no bridge is
    /// installed
    pub fn inject_received(&self, code: &str) -> bool {
        let bridge = self.state().receive.clone();
        bridge.map_or(false, |bridge| {
            let code = code.to_owned();
            std::thread::spawn(move || bridge.deliver(&code))
                .join()
                .is_ok()
        })
    }

    fn is_open(&self, handle: DeviceHandle) -> bool {
        self.state().open == Some(handle)
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn driver_version(&self) -> Option<u32> {
        self.state().version
    }

    async fn open(&self) -> std::result::Result<DeviceHandle, u32> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(code) = state.open_error {
            return Err(code);
        }
        let handle = DeviceHandle::from_raw(state.next_handle);
        state.next_handle += 1;
        state.open = Some(handle);
        Ok(handle)
    }

    async fn close(&self, handle: DeviceHandle) -> bool {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if state.open == Some(handle) {
            state.open = None;
            state.receive = None;
        }
        state.close_result
    }

    async fn info(&self, handle: DeviceHandle) -> Option<RawInfo> {
        if !self.is_open(handle) {
            return None;
        }
        self.state().info
    }

    async fn config(&self, handle: DeviceHandle) -> Option<u32> {
        if !self.is_open(handle) {
            return None;
        }
        Some(self.state().config)
    }

    async fn set_config(&self, handle: DeviceHandle, flags: u32) -> bool {
        if !self.is_open(handle) {
            return false;
        }
        let mut state = self.state();
        state.config = flags;
        state.config_writes.push(flags);
        true
    }

    async fn set_receive_callback(
        &self,
        handle: DeviceHandle,
        bridge: ReceiveBridge,
    ) -> bool {
        let mut state = self.state();
        if state.open != Some(handle) || !state.receive_callback_result {
            return false;
        }
        state.receive = Some(bridge);
        true
    }

    async fn transmit(
        &self,
        handle: DeviceHandle,
        code: &str,
        format: CodeFormat,
        repeat_count: u32,
        inactivity_wait_ms: u32,
        done: Option<CompletionSignal>,
    ) -> bool {
        let completion = {
            let mut state = self.state();
            state.transmits.push(TransmitCall {
                code: code.to_owned(),
                format,
                repeat_count,
                inactivity_wait_ms,
                blocking: done.is_some(),
            });
            if state.open != Some(handle) || !state.transmit_result {
                return false;
            }
            state.completion
        };

        if let Some(done) = done {
            match completion {
                Completion::Immediate => done.signal(),
                Completion::After(delay) => {
                    std::thread::spawn(move || {
                        std::thread::sleep(delay);
                        done.signal();
                    });
                }
                Completion::Never => (),
            }
        }
        true
    }

    async fn learn(
        &self,
        handle: DeviceHandle,
        format: CodeFormat,
        buf: &mut [u8],
        progress: &ProgressBridge,
        abort: &AbortFlag,
        forced_frequency_hz: u32,
    ) -> bool {
        let script = {
            let mut state = self.state();
            state.learn_requests.push((format, forced_frequency_hz));
            if state.open != Some(handle) {
                return false;
            }
            state.learn.clone()
        };

        for event in script.progress {
            // report from a driver-owned thread, one at a time
            std::thread::scope(|s| {
                s.spawn(|| {
                    progress.report(
                        event.progress_percent,
                        event.signal_quality,
                        event.carrier_frequency_hz,
                    );
                });
            });
        }

        if script.hold_until_abort {
            while !abort.is_set() {
                tokio::time::sleep(ABORT_POLL_INTERVAL).await;
            }
            return false;
        }
        if abort.is_set() {
            return false;
        }

        let Some(code) = script.code else {
            return false;
        };
        let len = code.len().min(buf.len().saturating_sub(1));
        buf[..len].copy_from_slice(&code.as_bytes()[..len]);
        if let Some(nul) = buf.get_mut(len) {
            *nul = 0;
        }
        true
    }
}
