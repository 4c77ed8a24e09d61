//! # rtutcp - Modbus RTU framing over byte streams
//!
//! `rtutcp` moves Modbus RTU frames across a connection that has no message
//! boundaries of its own (TCP, Unix sockets, vsock, ...). It provides:
//!
//! - **Half-duplex exchange**: one request on the wire at a time, whatever the
//!   number of concurrent callers
//! - **Response framing**: the response length is predicted from the request's
//!   function code, so exactly the bytes of one reply are consumed
//! - **Exception replies**: `function | 0x80` replies are read as fixed 5-byte frames
//! - **Deadlines**: every write and read is bounded by the request timeout
//! - **Idle close**: the connection is shut down after a period without exchanges
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │               Client layer (PDU encode/decode)           │
//! ├─────────────────────────────────────────────────────────┤
//! │                  RtuOverTcpTransport                     │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │  Exchange   │ │ Idle timer  │ │   Trace sink    │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                  Frame length prediction                 │
//! ├─────────────────────────────────────────────────────────┤
//! │          Byte stream (AsyncRead + AsyncWrite)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use rtutcp::{frame, TcpTransport, TransportConfig};
//!
//! let transport = TcpTransport::connect("127.0.0.1:5020", TransportConfig::default()).await?;
//!
//! let request = frame::read_holding_registers(1, 300, 1);
//! let response = transport.exchange(&request).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod io;
pub mod trace;
pub mod transport;

// Re-export commonly used types
pub use config::TransportConfig;
pub use crate::crc::Crc16;
pub use error::{Error, ErrorKind, Result};
pub use frame::{ResponseLength, RtuFrameLength};
pub use trace::{HexDump, LogSink, Silent, TraceSink};
pub use transport::{RtuOverTcpTransport, TcpTransport};

use std::time::Duration;

/// Smallest RTU frame: slave id, function code and CRC.
pub const RTU_MIN_SIZE: usize = 4;

/// Largest RTU frame allowed on the wire.
pub const RTU_MAX_SIZE: usize = 256;

/// Size of an exception reply: slave id, function code, exception code and CRC.
pub const RTU_EXCEPTION_SIZE: usize = 5;

/// Default bound for one write+read round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default inactivity period before the connection is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
