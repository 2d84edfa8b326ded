//! Binary channels between the bridge and the locator
//!
//! - [`channel`]: telemetry channel table and per-channel decode strategy
//! - [`receiver`]: one read-and-decode loop per telemetry channel
//! - [`sender`]: sensor datagram channels the locator connects to

pub mod channel;
pub mod receiver;
pub mod sender;

pub use channel::{ChannelDecoder, ReceiveChannel};
pub use receiver::{ReceiveDispatcher, ReceiveStopper, ReceiverThread};
pub use sender::{SendDispatcher, SendingStatus};
