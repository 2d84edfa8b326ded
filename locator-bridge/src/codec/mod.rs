//! Binary codec for the locator's datagram channels
//!
//! - [`cursor`]: speculative little-endian reads over buffered socket bytes
//! - [`writer`]: the matching little-endian writer
//! - [`decode`]: inbound telemetry records
//! - [`encode`]: outbound laser and odometry datagrams

pub mod cursor;
pub mod decode;
pub mod encode;
pub mod writer;

pub use cursor::{ByteCursor, DatagramBuffer, DecodeError, DecodeResult, MAX_SECTION_BYTES};
pub use encode::{LaserEncoder, OdometryEncoder};
pub use writer::{DatagramWriter, EncodeError};
