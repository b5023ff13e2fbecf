//! Connection lifecycle and the operations that need an open device

use crate::{
    config::DeviceConfig,
    driver::{DeviceHandle, Driver, ProgressBridge, ReceiveBridge},
    format::CodeFormat,
    handler::{ProgressHandler, ReceiveHandler},
    learn::{
        LearnController, LearnOutcome, LearnProgress, LearnRequest,
        LEARN_BUFFER_LEN,
    },
    system::DeviceInfo,
    transmit::{self, TransmitRequest},
    Error, Result,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::RwLock;

/// A connection to one USB-UIRT through a [`Driver`].
///
/// All methods take `&self`; share a session between tasks or threads by
/// wrapping it in an `Arc`. Operations other than [`Session::connect`]
/// never fail hard: when the device is not connected, or the driver
/// reports a failure, they return `false` or `None`.
pub struct Session {
    driver: Arc<dyn Driver>,
    /// Readers are in-flight operations; connect and disconnect write
    handle: RwLock<Option<DeviceHandle>>,
    /// Lock-free view of `handle` for callers that must not queue behind
    /// a writer. Cleared as soon as a disconnect starts
    connected: AtomicBool,
    receive: ReceiveBridge,
    learner: LearnController,
}

/// Configures a [`Session`] before it is created
pub struct SessionBuilder {
    driver: Arc<dyn Driver>,
    receive: Option<Arc<dyn ReceiveHandler>>,
    progress: Option<Arc<dyn ProgressHandler>>,
    learn_buffer_len: usize,
}

impl SessionBuilder {
    /// Called for every code the device receives while connected. Runs on
    /// the driver's thread
    #[must_use]
    pub fn receive_handler(
        mut self,
        handler: impl ReceiveHandler + 'static,
    ) -> Self {
        self.receive = Some(Arc::new(handler));
        self
    }

    /// Called for every progress notification during a learn. Runs on the
    /// driver's thread
    #[must_use]
    pub fn progress_handler(
        mut self,
        handler: impl ProgressHandler + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(handler));
        self
    }

    /// Size of the learn scratch buffer. Values below
    /// [`LEARN_BUFFER_LEN`] are raised to it
    #[must_use]
    pub fn learn_buffer_len(mut self, len: usize) -> Self {
        self.learn_buffer_len = len.max(LEARN_BUFFER_LEN);
        self
    }

    pub fn build(self) -> Session {
        let receive: Arc<dyn ReceiveHandler> = match self.receive {
            Some(handler) => handler,
            None => Arc::new(|_: &str| {}),
        };
        let progress: Arc<dyn ProgressHandler> = match self.progress {
            Some(handler) => handler,
            None => Arc::new(|_: LearnProgress| {}),
        };
        Session {
            driver: self.driver,
            handle: RwLock::new(None),
            connected: AtomicBool::new(false),
            receive: ReceiveBridge::new(receive),
            learner: LearnController::new(
                self.learn_buffer_len,
                ProgressBridge::new(progress),
            ),
        }
    }
}

impl Session {
    /// A disconnected session with no notification handlers
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::builder(driver).build()
    }

    pub fn builder(driver: Arc<dyn Driver>) -> SessionBuilder {
        SessionBuilder {
            driver,
            receive: None,
            progress: None,
            learn_buffer_len: LEARN_BUFFER_LEN,
        }
    }

    /// Version of the installed driver. Does not need a connection
    pub async fn driver_version(&self) -> Option<u32> {
        self.driver.driver_version().await
    }

    /// Open the device and start delivering received codes to the receive
    /// handler. Succeeds without doing anything if already connected.
    ///
    /// On error the session stays disconnected and `connect` may be
    /// retried.
    #[tracing::instrument(skip_all)]
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.handle.write().await;
        if slot.is_some() {
            debug!("already connected");
            return Ok(());
        }

        let handle = self.driver.open().await.map_err(|code| {
            let err = Error::from_driver_code(code);
            warn!(code, %err, "open failed");
            err
        })?;

        if !self
            .driver
            .set_receive_callback(handle, self.receive.clone())
            .await
        {
            warn!(?handle, "unable to set receive callback; closing");
            if !self.driver.close(handle).await {
                warn!(?handle, "close after failed connect also failed");
            }
            return Err(Error::ReceiveCallback);
        }

        *slot = Some(handle);
        self.connected.store(true, Ordering::SeqCst);
        debug!(?handle, "connected");
        Ok(())
    }

    /// Close the device. Returns `true` straight away if not connected;
    /// otherwise returns whether the driver closed it cleanly. The session
    /// is disconnected afterwards either way.
    ///
    /// An in-flight learn is aborted first and ends as
    /// [`LearnOutcome::Aborted`]; learns started from now on are declined.
    #[tracing::instrument(skip_all)]
    pub async fn disconnect(&self) -> bool {
        self.connected.store(false, Ordering::SeqCst);
        if self.learner.is_learning() {
            debug!("aborting in-flight learn");
            self.learner.abort();
        }

        let mut slot = self.handle.write().await;
        self.connected.store(false, Ordering::SeqCst);
        let Some(handle) = slot.take() else {
            return true;
        };
        let closed = self.driver.close(handle).await;
        if closed {
            debug!(?handle, "disconnected");
        } else {
            warn!(?handle, "driver failed to close device");
        }
        closed
    }

    /// Whether a device handle is held. Never waits; reads `false` once a
    /// disconnect has started
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Firmware and protocol versions, read fresh from the device. `None`
    /// when not connected or the driver call fails
    pub async fn info(&self) -> Option<DeviceInfo> {
        let slot = self.handle.read().await;
        let handle = (*slot)?;
        let raw = self.driver.info(handle).await;
        if raw.is_none() {
            warn!(?handle, "driver failed to read info");
        }
        raw.map(DeviceInfo::from)
    }

    /// Current config flags. `None` when not connected or the driver call
    /// fails
    pub async fn config(&self) -> Option<DeviceConfig> {
        let slot = self.handle.read().await;
        let handle = (*slot)?;
        let bits = self.driver.config(handle).await;
        if bits.is_none() {
            warn!(?handle, "driver failed to read config");
        }
        bits.map(DeviceConfig::from_bits)
    }

    /// Write all config flags in one call. Returns `false` without doing
    /// anything when not connected
    pub async fn set_config(&self, config: DeviceConfig) -> bool {
        let slot = self.handle.read().await;
        let Some(handle) = *slot else {
            return false;
        };
        debug!(bits = config.bits(), "writing config");
        let ok = self.driver.set_config(handle, config.bits()).await;
        if !ok {
            warn!(?handle, "driver failed to write config");
        }
        ok
    }

    /// Transmit a code. See [`TransmitRequest`] for the options; a
    /// blocking transmit waits up to [`crate::TRANSMIT_TIMEOUT`].
    #[tracing::instrument(skip_all, fields(blocking = request.blocking))]
    pub async fn transmit(&self, request: &TransmitRequest) -> bool {
        let slot = self.handle.read().await;
        let Some(handle) = *slot else {
            debug!("not connected; transmit declined");
            return false;
        };
        transmit::transmit(self.driver.as_ref(), handle, request).await
    }

    /// Transmit with every option spelled out
    pub async fn transmit_with(
        &self,
        code: &str,
        format: CodeFormat,
        repeat_count: u32,
        inactivity_wait_ms: u32,
        blocking: bool,
    ) -> bool {
        let request = TransmitRequest::new(code)
            .format(format)
            .repeat_count(repeat_count)
            .inactivity_wait_ms(inactivity_wait_ms)
            .blocking(blocking);
        self.transmit(&request).await
    }

    /// Transmit a Pronto code once without waiting for inactivity
    pub async fn transmit_pronto(&self, code: &str, blocking: bool) -> bool {
        self.transmit(&TransmitRequest::new(code).blocking(blocking))
            .await
    }

    /// Learn a code, reporting how the attempt ended. Only one learn runs
    /// per session; a call made while another is in progress returns
    /// [`LearnOutcome::Declined`] immediately.
    ///
    /// There is no timeout. Use [`Session::abort_learn`] to give up.
    #[tracing::instrument(skip_all)]
    pub async fn learn_outcome(&self, request: LearnRequest) -> LearnOutcome {
        let Some(learning) = self.learner.begin() else {
            debug!("learn already in progress; declined");
            return LearnOutcome::Declined;
        };

        let slot = self.handle.read().await;
        // a disconnect that started before the claim may not have seen it
        let handle = match *slot {
            Some(handle) if self.connected.load(Ordering::SeqCst) => handle,
            _ => {
                debug!("not connected; learn declined");
                return LearnOutcome::Declined;
            }
        };
        self.learner
            .learn(learning, self.driver.as_ref(), handle, request)
            .await
    }

    /// Learn a code, or `None` if learning was declined, aborted or failed
    pub async fn learn_with(&self, request: LearnRequest) -> Option<String> {
        self.learn_outcome(request).await.into_code()
    }

    /// Learn in `format` with the carrier frequency auto-detected
    pub async fn learn_format(&self, format: CodeFormat) -> Option<String> {
        self.learn_with(LearnRequest::new(format)).await
    }

    /// Learn in Pronto format with the carrier frequency auto-detected
    pub async fn learn(&self) -> Option<String> {
        self.learn_with(LearnRequest::default()).await
    }

    /// Ask the driver to stop the current learn, which then ends as
    /// [`LearnOutcome::Aborted`]. Has no effect when nothing is being
    /// learned. Safe to call from any thread
    pub fn abort_learn(&self) {
        self.learner.abort();
    }

    pub fn is_learning(&self) -> bool {
        self.learner.is_learning()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::mock::{Completion, LearnScript, MockDriver};
    use crate::system::RawInfo;
    use std::time::{Duration, Instant};

    fn session() -> (Arc<MockDriver>, Session) {
        let driver = Arc::new(MockDriver::new());
        let session = Session::new(driver.clone());
        (driver, session)
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        assert!(session.disconnect().await);
        assert!(session.disconnect().await);
        assert!(!session.is_connected());
        assert_eq!(driver.close_calls(), 1);
    }

    #[tokio::test]
    async fn disconnect_clears_handle_when_close_fails() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        driver.set_close_result(false);
        assert!(!session.disconnect().await);
        assert!(!session.is_connected());
        assert!(session.disconnect().await);
    }

    #[tokio::test]
    async fn connect_maps_driver_errors() {
        let (driver, session) = session();
        for (code, expected) in [
            (0x2000_0001, Error::Connection),
            (0x2000_0002, Error::Communication),
            (0x2000_0003, Error::DriverNotFound),
            (0x2000_0004, Error::IncompatibleFirmware),
            (0x1234, Error::Unknown(0x1234)),
        ] {
            driver.set_open_error(Some(code));
            assert_eq!(session.connect().await.unwrap_err(), expected);
            assert!(!session.is_connected());
        }
    }

    #[tokio::test]
    async fn connect_is_retryable() {
        let (driver, session) = session();
        driver.set_open_error(Some(0x2000_0001));
        session.connect().await.unwrap_err();
        driver.set_open_error(None);
        session.connect().await.unwrap();
        assert!(session.is_connected());
        assert_eq!(driver.open_calls(), 2);
        assert_eq!(driver.open_handle(), Some(DeviceHandle::from_raw(1)));
    }

    #[tokio::test]
    async fn connect_twice_keeps_first_handle() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        session.connect().await.unwrap();
        assert_eq!(driver.open_calls(), 1);
    }

    #[tokio::test]
    async fn failed_receive_callback_closes_device() {
        let (driver, session) = session();
        driver.set_receive_callback_result(false);
        assert_eq!(
            session.connect().await.unwrap_err(),
            Error::ReceiveCallback
        );
        assert!(!session.is_connected());
        assert_eq!(driver.close_calls(), 1);
        assert_eq!(driver.open_handle(), None);
    }

    #[tokio::test]
    async fn operations_declined_while_disconnected() {
        let (driver, session) = session();
        assert_eq!(session.info().await, None);
        assert_eq!(session.config().await, None);
        assert!(!session.set_config(DeviceConfig::default()).await);
        assert!(!session.transmit_pronto("0000", false).await);
        assert_eq!(
            session.learn_outcome(LearnRequest::default()).await,
            LearnOutcome::Declined
        );
        assert!(driver.transmits().is_empty());
        assert!(driver.learn_requests().is_empty());
        assert!(driver.config_writes().is_empty());
    }

    #[tokio::test]
    async fn info_failure_is_none() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        driver.set_info(None);
        assert_eq!(session.info().await, None);
        driver.set_info(Some(RawInfo {
            fw_version: 0x0203,
            ..RawInfo::default()
        }));
        assert_eq!(session.info().await.unwrap().firmware_version, "2.3");
    }

    #[tokio::test]
    async fn config_round_trips_every_combination() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        for bits in 0..8 {
            driver.set_config_bits(bits);
            let cfg = session.config().await.unwrap();
            assert!(session.set_config(cfg).await);
            assert_eq!(driver.config_bits(), bits);
        }
    }

    #[tokio::test]
    async fn transmit_passes_request_through() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        assert!(
            session
                .transmit_with("1234", CodeFormat::UUIRT, 3, 20, false)
                .await
        );
        let call = &driver.transmits()[0];
        assert_eq!(call.code, "1234");
        assert_eq!(call.format, CodeFormat::UUIRT);
        assert_eq!(call.repeat_count, 3);
        assert_eq!(call.inactivity_wait_ms, 20);
        assert!(!call.blocking);
    }

    #[tokio::test]
    async fn blocking_transmit_waits_for_completion() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        driver.set_completion(Completion::After(Duration::from_millis(100)));
        let start = Instant::now();
        assert!(session.transmit_pronto("0000 006D", true).await);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(driver.transmits()[0].blocking);
    }

    #[tokio::test]
    async fn rejected_transmit_fails() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        driver.set_transmit_result(false);
        assert!(!session.transmit_pronto("0000", true).await);
        assert!(!session.transmit_pronto("0000", false).await);
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_transmit_times_out() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        driver.set_completion(Completion::Never);
        let start = tokio::time::Instant::now();
        assert!(!session.transmit_pronto("0000", true).await);
        let waited = start.elapsed();
        assert!(waited >= crate::TRANSMIT_TIMEOUT);
        assert!(waited < crate::TRANSMIT_TIMEOUT + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn learn_failure_and_success() {
        let (driver, session) = session();
        session.connect().await.unwrap();

        driver.set_learn_script(LearnScript::fails());
        assert_eq!(
            session.learn_outcome(LearnRequest::default()).await,
            LearnOutcome::Failed
        );
        assert!(!session.is_learning());

        driver.set_learn_script(LearnScript::completes([], "0000 0071"));
        assert_eq!(session.learn().await.as_deref(), Some("0000 0071"));
        assert!(!session.is_learning());
    }

    #[tokio::test]
    async fn learn_passes_format_and_frequency() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        session.learn().await;
        session.learn_format(CodeFormat::UUIRT).await;
        session
            .learn_with(
                LearnRequest::new(
                    CodeFormat::PRONTO | CodeFormat::FORCE_FREQUENCY,
                )
                .forced_frequency_hz(40_000),
            )
            .await;
        assert_eq!(
            driver.learn_requests(),
            [
                (CodeFormat::PRONTO, 0),
                (CodeFormat::UUIRT, 0),
                (CodeFormat::PRONTO | CodeFormat::FORCE_FREQUENCY, 40_000),
            ]
        );
    }

    #[tokio::test]
    async fn learned_buffer_is_not_reused_stale() {
        let (driver, session) = session();
        session.connect().await.unwrap();
        driver.set_learn_script(LearnScript::completes([], "0000 006D 0001"));
        assert_eq!(session.learn().await.as_deref(), Some("0000 006D 0001"));
        driver.set_learn_script(LearnScript::completes([], "12"));
        assert_eq!(session.learn().await.as_deref(), Some("12"));
    }

    #[test]
    fn learn_buffer_len_has_a_floor() {
        let builder =
            Session::builder(Arc::new(MockDriver::new())).learn_buffer_len(16);
        assert_eq!(builder.learn_buffer_len, LEARN_BUFFER_LEN);
    }
}
