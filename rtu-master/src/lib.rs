//! A [Modbus RTU](https://modbus.org/) master for half-duplex serial links
//! built on [Tokio](https://docs.rs/tokio).
//!
//! # Features
//!
//! * Panic-free parsing of RTU frames with CRC-16 validation
//! * Strict one-request-in-flight scheduling with inter-frame silence
//! * Configurable response timeout and retry count
//! * Automatic serial port management with a configurable retry strategy
//! * Sans-I/O core ([`RtuMaster`]) usable without the bundled serial task
//!
//! # Supported Functions
//!
//! * Read Coils
//! * Read Discrete Inputs
//! * Read Holding Registers
//! * Read Input Registers
//! * Write Single Coil
//! * Write Single Register
//! * Write Multiple Coils
//! * Write Multiple Registers
//! * Read/Write Multiple Registers
//! * Any other function code via raw requests
//!
//! # Example
//!
//! ```no_run
//! use rtu_master::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut channel = spawn_rtu_master(
//!         "/dev/ttyUSB0",
//!         SerialSettings::with_baud_rate(19200),
//!         MasterConfig::default(),
//!         16,
//!         default_retry_strategy(),
//!         DecodeLevel::default(),
//!         None,
//!     );
//!
//!     channel.enable().await?;
//!
//!     let unit = channel
//!         .read(
//!             DataUnit::new(RegisterType::HoldingRegisters, 0, 5),
//!             ServerAddress::new(1),
//!         )
//!         .await?;
//!
//!     for value in unit.iter() {
//!         println!("{value}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc(test(attr(allow(unused, unused_crate_dependencies))))]

/// Client (master) API
pub mod client;

mod common;
mod constants;
mod decode;
mod error;
mod exception;
mod retry;
mod serial;
mod types;

pub use crate::client::*;
pub use crate::common::function::FunctionCode;
pub use crate::common::pdu::{Pdu, MAX_PDU_LENGTH};
pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::*;
pub use crate::retry::*;
pub use crate::serial::frame::{build_adu, crc16, try_parse_adu, try_parse_response, Adu};
pub use crate::serial::*;
pub use crate::types::*;

#[cfg(all(test, not(feature = "serial")))]
use sfio_tokio_mock_io as _;
