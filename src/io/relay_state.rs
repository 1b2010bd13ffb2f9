// relaycard/src/io/relay_state.rs
//
// Relay state vector: 8 channel flags packed into one byte.
// Index i corresponds to bit i (0 = least significant).

use std::fmt;
use std::ops::Index;

use crate::error::{RelayError, Result};

/// Number of relay channels on one card.
pub const CHANNEL_COUNT: usize = 8;

/// On/off state of the 8 relays of one card.
///
/// This is a plain `Copy` value. Changing a channel produces a new vector;
/// callers never patch a shared one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelayFlags([bool; CHANNEL_COUNT]);

impl RelayFlags {
    pub const ALL_OFF: RelayFlags = RelayFlags([false; CHANNEL_COUNT]);
    pub const ALL_ON: RelayFlags = RelayFlags([true; CHANNEL_COUNT]);

    pub const fn new(flags: [bool; CHANNEL_COUNT]) -> Self {
        RelayFlags(flags)
    }

    /// Unpack a state byte: `flags[i] = (byte >> i) & 1`.
    pub fn from_byte(byte: u8) -> Self {
        let mut flags = [false; CHANNEL_COUNT];
        for (i, flag) in flags.iter_mut().enumerate() {
            *flag = (byte >> i) & 0x1 == 1;
        }
        RelayFlags(flags)
    }

    /// Unpack a wider integer, rejecting anything outside 0..=255.
    pub fn from_value(value: i64) -> Result<Self> {
        let byte = u8::try_from(value)
            .map_err(|_| RelayError::range(format!("state value {} outside 0..=255", value)))?;
        Ok(Self::from_byte(byte))
    }

    /// Pack into a state byte, walking from channel 7 down to channel 0.
    pub fn to_byte(&self) -> u8 {
        let mut byte = 0u8;
        for &flag in self.0.iter().rev() {
            byte <<= 1;
            byte |= flag as u8;
        }
        byte
    }

    /// Mask with only `index` set.
    pub fn single(index: usize) -> Result<Self> {
        check_index(index)?;
        let mut flags = [false; CHANNEL_COUNT];
        flags[index] = true;
        Ok(RelayFlags(flags))
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    /// Copy of `self` with one channel set to `on`.
    pub fn with(mut self, index: usize, on: bool) -> Result<Self> {
        check_index(index)?;
        self.0[index] = on;
        Ok(self)
    }

    /// Copy of `self` with every listed channel set to `on`.
    pub fn with_channels(mut self, indices: &[usize], on: bool) -> Result<Self> {
        for &index in indices {
            check_index(index)?;
            self.0[index] = on;
        }
        Ok(self)
    }

    /// Copy of `self` with one channel inverted.
    pub fn toggled(mut self, index: usize) -> Result<Self> {
        check_index(index)?;
        self.0[index] = !self.0[index];
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    pub fn as_array(&self) -> [bool; CHANNEL_COUNT] {
        self.0
    }
}

impl From<[bool; CHANNEL_COUNT]> for RelayFlags {
    fn from(flags: [bool; CHANNEL_COUNT]) -> Self {
        RelayFlags(flags)
    }
}

impl TryFrom<&[bool]> for RelayFlags {
    type Error = RelayError;

    fn try_from(flags: &[bool]) -> Result<Self> {
        let array: [bool; CHANNEL_COUNT] = flags.try_into().map_err(|_| {
            RelayError::range(format!(
                "expected {} channel flags, got {}",
                CHANNEL_COUNT,
                flags.len()
            ))
        })?;
        Ok(RelayFlags(array))
    }
}

impl Index<usize> for RelayFlags {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        &self.0[index]
    }
}

impl fmt::Display for RelayFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Convert a 1-based channel number (as used in configuration and on the
/// command line) to a 0-based index.
pub fn channel_index(channel: u8) -> Result<usize> {
    if channel == 0 || channel as usize > CHANNEL_COUNT {
        return Err(RelayError::range(format!(
            "channel {} outside 1..={}",
            channel, CHANNEL_COUNT
        )));
    }
    Ok(channel as usize - 1)
}

fn check_index(index: usize) -> Result<()> {
    if index >= CHANNEL_COUNT {
        return Err(RelayError::range(format!(
            "relay index {} outside 0..{}",
            index, CHANNEL_COUNT
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
