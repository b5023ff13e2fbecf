//! IR code formats accepted by the transmit and learn APIs

use std::ops::{BitAnd, BitOr};

/// Bitflags selecting the textual format of an IR code. The base formats
/// ([`CodeFormat::UUIRT`] and [`CodeFormat::PRONTO`]) may be combined with
/// the learn modifiers using `|`.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct CodeFormat(pub(crate) u32);

impl CodeFormat {
    /// Native USB-UIRT format
    pub const UUIRT: Self = Self(0x0000);
    /// Pronto hex. The most reliable format for learning, though it
    /// produces the longest codes
    pub const PRONTO: Self = Self(0x0010);
    /// Learn: force the raw (unstructured) representation
    pub const FORCE_RAW: Self = Self(0x0100);
    /// Learn: force a structured representation
    pub const FORCE_STRUCTURED: Self = Self(0x0200);
    /// Learn: only accept the carrier frequency passed with the request
    pub const FORCE_FREQUENCY: Self = Self(0x0400);
    /// Learn: measure the carrier frequency of the remote
    pub const FREQUENCY_DETECT: Self = Self(0x0800);

    /// Raw flag value as passed to the driver
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag set in `other` is also set in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr<Self> for CodeFormat {
    type Output = Self;
    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitAnd<Self> for CodeFormat {
    type Output = Self;
    fn bitand(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}
