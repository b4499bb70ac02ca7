//! NMEA 2000 Fast Packet support: encapsulates payloads larger than eight bytes
//! across successive CAN frames.
//!
//! Frame layout, every frame eight bytes long and padded with `0xFF`:
//! - frame 0: `[seq << 5 | 0, total_len, 6 data bytes]`
//! - frame n: `[seq << 5 | n, 7 data bytes]`
/// Maximum payload a Fast Packet can transport once reassembled.
pub const MAX_FAST_PACKET_PAYLOAD: usize = 223;

/// Payload bytes carried by frame 0.
pub const FIRST_FRAME_DATA: usize = 6;
/// Payload bytes carried by every following frame.
pub const NEXT_FRAME_DATA: usize = 7;

pub mod assembler;
pub mod builder;

pub use builder::{encode_frame, SequenceTable};

/// Number of frames needed to carry `len` bytes.
#[inline]
pub fn frame_count(len: usize) -> u8 {
    if len > FIRST_FRAME_DATA {
        ((len - FIRST_FRAME_DATA).div_ceil(NEXT_FRAME_DATA) + 1) as u8
    } else {
        1
    }
}

#[cfg(test)]
mod tests;
