//! Persistent device configuration flags

/// Bitflag configuration stored on the device. Setters only ever touch
/// their own bit; bits this crate does not know about are carried through
/// unchanged so a read-modify-write never clobbers them.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct DeviceConfig(u32);

impl DeviceConfig {
    /// Blink the LED when IR is received
    pub const RECEIVE_LED: u32 = 0x0001;
    /// Blink the LED when IR is transmitted
    pub const TRANSMIT_LED: u32 = 0x0002;
    /// Legacy UIR-compatible receive codes
    pub const LEGACY_RECEIVE: u32 = 0x0004;

    /// Wrap a flag word read from the device
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Flag word to write to the device
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn receive_led(self) -> bool {
        self.0 & Self::RECEIVE_LED != 0
    }

    pub fn set_receive_led(&mut self, on: bool) {
        self.set(Self::RECEIVE_LED, on);
    }

    #[must_use]
    pub fn with_receive_led(mut self, on: bool) -> Self {
        self.set_receive_led(on);
        self
    }

    pub const fn transmit_led(self) -> bool {
        self.0 & Self::TRANSMIT_LED != 0
    }

    pub fn set_transmit_led(&mut self, on: bool) {
        self.set(Self::TRANSMIT_LED, on);
    }

    #[must_use]
    pub fn with_transmit_led(mut self, on: bool) -> Self {
        self.set_transmit_led(on);
        self
    }

    pub const fn legacy_receive(self) -> bool {
        self.0 & Self::LEGACY_RECEIVE != 0
    }

    pub fn set_legacy_receive(&mut self, on: bool) {
        self.set(Self::LEGACY_RECEIVE, on);
    }

    #[must_use]
    pub fn with_legacy_receive(mut self, on: bool) -> Self {
        self.set_legacy_receive(on);
        self
    }

    fn set(&mut self, flag: u32, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }
}

impl From<u32> for DeviceConfig {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<DeviceConfig> for u32 {
    fn from(cfg: DeviceConfig) -> Self {
        cfg.0
    }
}
