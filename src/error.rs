// relaycard/src/error.rs
//
// Error taxonomy for the relay card driver and its request pipeline.

use thiserror::Error;

/// Errors raised by the codec, transport, client and pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport is not open, or the handle could not be opened
    #[error("connection error: {0}")]
    Connection(String),

    /// Fewer than 4 bytes arrived before the read timed out
    #[error("response truncated: received {received} of 4 bytes")]
    TruncatedResponse { received: usize },

    /// Response command does not correspond to the request that elicited it
    #[error("protocol mismatch: expected response 0x{expected:02x}, received 0x{received:02x}")]
    ProtocolMismatch { expected: u8, received: u8 },

    /// Channel index or byte value outside its valid domain
    #[error("out of range: {0}")]
    Range(String),

    /// Command byte that is neither a known request nor a known response code
    #[error("unknown command code 0x{0:02x}")]
    UnknownCommand(u8),

    /// Received checksum byte differs from the XOR of the other three bytes
    #[error("checksum mismatch: expected 0x{expected:02x}, received 0x{received:02x}")]
    ChecksumMismatch { expected: u8, received: u8 },

    /// Too many noise chunks were discarded while waiting for a response header
    #[error("line desynchronized: discarded {discarded} chunks without a response header")]
    Desynchronized { discarded: usize },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Request queue is at capacity and the backpressure policy rejects
    #[error("request queue is full")]
    QueueFull,

    #[error("request queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    pub fn connection(message: impl Into<String>) -> Self {
        RelayError::Connection(message.into())
    }

    pub fn range(message: impl Into<String>) -> Self {
        RelayError::Range(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        RelayError::Configuration(message.into())
    }

    /// True for the connection family: no open link, or a response that
    /// could not be assembled.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RelayError::Connection(_) | RelayError::TruncatedResponse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
