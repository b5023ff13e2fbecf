#![allow(missing_docs, clippy::missing_docs_in_private_items)]

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Driver not found")]
    DriverNotFound,

    #[error("Unable to connect to device")]
    Connection,

    #[error("Unable to communicate with device")]
    Communication,

    #[error("Incompatible firmware")]
    IncompatibleFirmware,

    #[error("Unknown error: {0:#010x}")]
    Unknown(u32),

    #[error("Unable to set receive callback")]
    ReceiveCallback,
}

/// Last-error codes reported by the driver when opening the device fails
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum DriverError {
    Connection = 0x2000_0001,
    Communication = 0x2000_0002,
    DriverNotFound = 0x2000_0003,
    IncompatibleFirmware = 0x2000_0004,
}

impl TryFrom<u32> for DriverError {
    type Error = Error;
    fn try_from(code: u32) -> Result<Self> {
        Self::from_u32(code).ok_or(Error::Unknown(code))
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Connection => Self::Connection,
            DriverError::Communication => Self::Communication,
            DriverError::DriverNotFound => Self::DriverNotFound,
            DriverError::IncompatibleFirmware => Self::IncompatibleFirmware,
        }
    }
}

impl Error {
    /// Map a driver last-error code onto the matching connection error,
    /// falling back to [`Error::Unknown`] for codes the driver does not
    /// document
    pub fn from_driver_code(code: u32) -> Self {
        DriverError::try_from(code).map_or_else(|err| err, Self::from)
    }
}
