// relaycard/src/io/codec.rs
//
// Relay card wire codec.
//
// Every exchange is one 4-byte frame in each direction:
//   Request:  [command(0-8), address, data, command ^ address ^ data]
//   Response: [255 - command, address, data(state), checksum]
//
// Response command bytes all have a non-zero high nibble (0xF7..=0xFF),
// request codes never do. That is what `Frame::is_response` keys on.

use std::fmt;

use crate::checksums::{validate_xor_trailer, xor_checksum};
use crate::error::{RelayError, Result};
use crate::io::relay_state::RelayFlags;

/// Size of one wire frame in bytes.
pub const FRAME_LEN: usize = 4;

// ============================================================================
// Command Set
// ============================================================================

/// Request codes understood by the relay card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    Noop = 0,
    Setup = 1,
    GetPort = 2,
    SetPort = 3,
    GetOption = 4,
    SetOption = 5,
    SetSingle = 6,
    DelSingle = 7,
    Toggle = 8,
}

impl CommandCode {
    pub const ALL: [CommandCode; 9] = [
        CommandCode::Noop,
        CommandCode::Setup,
        CommandCode::GetPort,
        CommandCode::SetPort,
        CommandCode::GetOption,
        CommandCode::SetOption,
        CommandCode::SetSingle,
        CommandCode::DelSingle,
        CommandCode::Toggle,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Command byte the card answers this request with.
    pub fn response_code(self) -> u8 {
        255 - self as u8
    }

    /// Recover the request code from a response command byte.
    pub fn from_response(command: u8) -> Result<Self> {
        Self::try_from(255 - command)
    }

    pub fn label(self) -> &'static str {
        match self {
            CommandCode::Noop => "NOOP",
            CommandCode::Setup => "SETUP",
            CommandCode::GetPort => "GETPORT",
            CommandCode::SetPort => "SETPORT",
            CommandCode::GetOption => "GETOPTION",
            CommandCode::SetOption => "SETOPTION",
            CommandCode::SetSingle => "SETSINGLE",
            CommandCode::DelSingle => "DELSINGLE",
            CommandCode::Toggle => "TOGGLE",
        }
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = RelayError;

    fn try_from(code: u8) -> Result<Self> {
        CommandCode::ALL
            .get(code as usize)
            .copied()
            .ok_or(RelayError::UnknownCommand(code))
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One 4-byte wire frame. The checksum is derived from the other fields;
/// frames decoded from the wire also remember the checksum byte they carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    command: u8,
    address: u8,
    data: u8,
    received_checksum: Option<u8>,
}

impl Frame {
    pub fn new(command: u8, address: u8, data: u8) -> Self {
        Self {
            command,
            address,
            data,
            received_checksum: None,
        }
    }

    /// Request frame for a known command.
    pub fn request(command: CommandCode, address: u8, data: u8) -> Self {
        Self::new(command.code(), address, data)
    }

    /// Frame built from 4 received bytes. The checksum byte is kept but not checked.
    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self {
            command: bytes[0],
            address: bytes[1],
            data: bytes[2],
            received_checksum: Some(bytes[3]),
        }
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn data(&self) -> u8 {
        self.data
    }

    pub fn data_flags(&self) -> RelayFlags {
        RelayFlags::from_byte(self.data)
    }

    pub fn checksum(&self) -> u8 {
        xor_checksum(&[self.command, self.address, self.data])
    }

    pub fn received_checksum(&self) -> Option<u8> {
        self.received_checksum
    }

    /// Fails when a decoded frame carried a checksum byte that does not match.
    /// Frames built locally always pass.
    pub fn verify_checksum(&self) -> Result<()> {
        let Some(received) = self.received_checksum else {
            return Ok(());
        };
        validate_xor_trailer(&[self.command, self.address, self.data, received])
            .map_err(|(expected, received)| RelayError::ChecksumMismatch { expected, received })
    }

    pub fn is_response(&self) -> bool {
        self.command & 0xF0 != 0
    }

    /// Request code this frame stands for (`255 - command` for responses).
    pub fn logical_command(&self) -> Result<CommandCode> {
        if self.is_response() {
            CommandCode::from_response(self.command)
        } else {
            CommandCode::try_from(self.command)
        }
    }

    pub fn label(&self) -> Result<&'static str> {
        self.logical_command().map(CommandCode::label)
    }

    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        [self.command, self.address, self.data, self.checksum()]
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#04x} {} {}",
            self.command,
            self.label().unwrap_or("UNKNOWN"),
            self.data_flags()
        )
    }
}

// ============================================================================
// Frame Codec Trait
// ============================================================================

/// Encode/decode between frames and their wire representation.
pub trait FrameCodec {
    /// The raw frame type for decoding
    type RawFrame: ?Sized;

    /// The encoded frame type for transmission
    type EncodedFrame;

    fn decode(raw: &Self::RawFrame) -> Result<Frame>;

    fn encode(frame: &Frame) -> Self::EncodedFrame;
}

/// Codec for the fixed 4-byte relay card frame.
pub struct RelayCodec;

impl FrameCodec for RelayCodec {
    type RawFrame = [u8];
    type EncodedFrame = [u8; FRAME_LEN];

    /// Decode a received chunk. Anything shorter than a frame is a truncated response.
    fn decode(raw: &[u8]) -> Result<Frame> {
        let bytes: [u8; FRAME_LEN] = raw
            .get(..FRAME_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(RelayError::TruncatedResponse { received: raw.len() })?;
        Ok(Frame::from_bytes(bytes))
    }

    fn encode(frame: &Frame) -> [u8; FRAME_LEN] {
        frame.to_bytes()
    }
}

// ============================================================================
// Tests
// ============================================================================
