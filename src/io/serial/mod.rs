// relaycard/src/io/serial/mod.rs
//
// Serial link to the relay card.
//
// Features:
// - Fixed 19200 8N1 line, 1 s read timeout
// - One request/response exchange at a time with read resynchronization
// - Pluggable link so tests can script the byte stream

#[cfg(test)]
pub(crate) mod mock;
pub mod transport;
pub mod utils;

pub use transport::{SerialLink, SerialTransport, TransportOptions};
pub use utils::SerialLineConfig;
