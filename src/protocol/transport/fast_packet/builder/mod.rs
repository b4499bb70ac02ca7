//! Fast Packet frame encoding and the per-PGN sequence counters used on transmit.
use crate::protocol::transport::fast_packet::{FIRST_FRAME_DATA, NEXT_FRAME_DATA};

/// Encode frame `index` of a Fast Packet whose payload is `payload`.
///
/// `position` is the number of payload bytes already sent. Returns the eight frame bytes
/// and the number of payload bytes consumed by this frame.
pub fn encode_frame(sequence: u8, index: u8, payload: &[u8], position: usize) -> ([u8; 8], usize) {
    let mut data = [0xFF; 8];
    data[0] = ((sequence & 0x07) << 5) | (index & 0x1F);

    let remaining = payload.len().saturating_sub(position);
    if index == 0 {
        data[1] = payload.len().min(u8::MAX as usize) as u8;
        let used = remaining.min(FIRST_FRAME_DATA);
        data[2..2 + used].copy_from_slice(&payload[position..position + used]);
        (data, used)
    } else {
        let used = remaining.min(NEXT_FRAME_DATA);
        data[1..1 + used].copy_from_slice(&payload[position..position + used]);
        (data, used)
    }
}

/// Slots tracked individually before PGNs start sharing the overflow counter.
pub const SEQUENCE_SLOTS: usize = 16;

/// Three-bit transmit sequence counter per PGN.
///
/// Receivers match frames on (PGN, source, sequence), so two back-to-back transfers of the
/// same PGN must not reuse a sequence.
#[derive(Debug, Clone, Default)]
pub struct SequenceTable {
    slots: [Option<(u32, u8)>; SEQUENCE_SLOTS],
    overflow: u8,
}

impl SequenceTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; SEQUENCE_SLOTS],
            overflow: 0,
        }
    }

    /// Sequence to use for the next transfer of `pgn`.
    pub fn next(&mut self, pgn: u32) -> u8 {
        let mut free = None;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Some((known, seq)) if *known == pgn => {
                    let current = *seq;
                    *seq = (current + 1) & 0x07;
                    return current;
                }
                None if free.is_none() => free = Some(i),
                _ => {}
            }
        }

        if let Some(i) = free {
            self.slots[i] = Some((pgn, 1));
            return 0;
        }

        // table full
        let current = self.overflow;
        self.overflow = (current + 1) & 0x07;
        current
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
