// relaycard/src/checksums.rs
//
// Checksum calculation for relay card frames.

// ============================================================================
// Named Checksum Functions
// ============================================================================

/// XOR of all bytes.
/// The relay card protects each frame with the XOR of command, address and data.
pub fn xor_checksum(data: &[u8]) -> u8 {
    let mut result: u8 = 0;
    for &byte in data {
        result ^= byte;
    }
    result
}

/// Check a frame whose last byte is the XOR checksum of the preceding bytes.
/// Returns `(calculated, extracted)` when they differ.
pub fn validate_xor_trailer(frame: &[u8]) -> Result<(), (u8, u8)> {
    let Some((&extracted, body)) = frame.split_last() else {
        return Ok(());
    };
    let calculated = xor_checksum(body);
    if calculated == extracted {
        Ok(())
    } else {
        Err((calculated, extracted))
    }
}

// ============================================================================
// Tests
// ============================================================================
