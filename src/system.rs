//! Device metadata reported by the transceiver

use std::fmt::{self, Display, Formatter};

/// The info block exactly as the driver reports it
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RawInfo {
    /// Firmware version; high byte major, low byte minor
    pub fw_version: u16,
    /// Protocol version; high byte major, low byte minor
    pub prot_version: u16,
    pub fw_date_day: u8,
    pub fw_date_month: u8,
    /// Years since 2000
    pub fw_date_year: u8,
}

/// A packed `major.minor` version
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl From<u16> for Version {
    fn from(packed: u16) -> Self {
        let [major, minor] = packed.to_be_bytes();
        Self { major, minor }
    }
}

impl Display for Version {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.major, self.minor)
    }
}

/// Firmware build date
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct FwDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Display for FwDate {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "{}/{}/{}", self.month, self.day, self.year)
    }
}

/// Decoded snapshot of the device's firmware and protocol versions.
/// Fetched fresh on every [`crate::Session::info`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version as `major.minor`
    pub firmware_version: String,
    /// Protocol version as `major.minor`
    pub protocol_version: String,
    /// Firmware date as `month/day/year`
    pub firmware_date: String,
    /// Numeric firmware version
    pub firmware: Version,
    /// Numeric protocol version
    pub protocol: Version,
    /// Numeric firmware date
    pub date: FwDate,
}

impl From<RawInfo> for DeviceInfo {
    fn from(raw: RawInfo) -> Self {
        let firmware = Version::from(raw.fw_version);
        let protocol = Version::from(raw.prot_version);
        let date = FwDate {
            year: 2000 + u16::from(raw.fw_date_year),
            month: raw.fw_date_month,
            day: raw.fw_date_day,
        };
        Self {
            firmware_version: firmware.to_string(),
            protocol_version: protocol.to_string(),
            firmware_date: date.to_string(),
            firmware,
            protocol,
            date,
        }
    }
}
