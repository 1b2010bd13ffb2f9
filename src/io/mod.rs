// relaycard/src/io/mod.rs
//
// Device side of the relay card: wire codec, relay state vector, serial
// transport and the high-level client built on them.

pub mod client;
pub mod codec;
pub mod relay_state;
pub mod serial;

pub use client::{RelayCardClient, DEFAULT_PULSE_CHANNELS, DEFAULT_PULSE_HOLD};
pub use codec::{CommandCode, Frame, FrameCodec, RelayCodec, FRAME_LEN};
pub use relay_state::{channel_index, RelayFlags, CHANNEL_COUNT};
pub use serial::{SerialLink, SerialTransport, TransportOptions};
