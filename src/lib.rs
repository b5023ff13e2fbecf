//! Control layer for the USB-UIRT infrared transceiver.
//!
//! A [`Session`] wraps the vendor driver behind the [`Driver`] trait and
//! provides connect/disconnect, device info and config, IR transmit, and
//! IR learning with progress notifications and cooperative abort.
//!
//! ```no_run
//! use std::sync::Arc;
//! use uuirt::{driver::mock::MockDriver, LearnProgress, Session};
//!
//! # async fn example() -> uuirt::Result<()> {
//! let session = Session::builder(Arc::new(MockDriver::new()))
//!     .receive_handler(|code: &str| println!("received {code}"))
//!     .progress_handler(|p: LearnProgress| println!("{}%", p.progress_percent))
//!     .build();
//!
//! session.connect().await?;
//! if let Some(code) = session.learn().await {
//!     session.transmit_pronto(&code, true).await;
//! }
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub use config::DeviceConfig;
pub use driver::{DeviceHandle, Driver};
pub use error::{DriverError, Error, Result};
pub use format::CodeFormat;
pub use handler::{ProgressHandler, ReceiveHandler};
pub use learn::{LearnOutcome, LearnProgress, LearnRequest, LEARN_BUFFER_LEN};
pub use session::{Session, SessionBuilder};
pub use system::{DeviceInfo, FwDate, RawInfo, Version};
pub use transmit::{TransmitRequest, COMPLETION_SIGNAL_NAME, TRANSMIT_TIMEOUT};

pub mod config;
pub mod driver;
mod error;
pub mod format;
pub mod handler;
pub mod learn;
mod session;
pub mod system;
pub mod transmit;
