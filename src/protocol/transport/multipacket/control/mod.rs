//! TP.CM control messages.
//!
//! Every control frame is eight bytes; the PGN of the transferred message sits in
//! bytes 5 to 7, little-endian.
//!
//! | control | bytes 1..5 |
//! |---------|------------|
//! | RTS 16  | size lo, size hi, frames, max frames per CTS |
//! | CTS 17  | frames granted, next frame, 0xFF, 0xFF |
//! | EOM 19  | size lo, size hi, frames, 0xFF |
//! | BAM 32  | size lo, size hi, frames, 0xFF |
//! | Abort 255 | reason, 0xFF, 0xFF, 0xFF |
use super::{TP_CM_PGN, TP_CM_PRIORITY};
use crate::protocol::transport::dob::{Dob, DobFlags, DobState};

pub const CONTROL_RTS: u8 = 16;
pub const CONTROL_CTS: u8 = 17;
pub const CONTROL_EOM: u8 = 19;
pub const CONTROL_BAM: u8 = 32;
pub const CONTROL_ABORT: u8 = 255;

/// Reason codes carried by a TP.CM Abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AbortReason {
    AlreadyInSession = 1,
    /// No buffer or transfer object for the session.
    Resources = 2,
    Timeout = 3,
    CtsWhileSending = 4,
    RetransmitLimit = 5,
    UnexpectedData = 6,
    BadSequence = 7,
    DuplicateSequence = 8,
    /// Declared size does not match the frame count or exceeds the maximum.
    BadSize = 9,
    Unspecified = 0xFF,
}

impl From<u8> for AbortReason {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::AlreadyInSession,
            2 => Self::Resources,
            3 => Self::Timeout,
            4 => Self::CtsWhileSending,
            5 => Self::RetransmitLimit,
            6 => Self::UnexpectedData,
            7 => Self::BadSequence,
            8 => Self::DuplicateSequence,
            9 => Self::BadSize,
            _ => Self::Unspecified,
        }
    }
}

/// Decoded TP.CM message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TpCm {
    Rts {
        size: u16,
        frames: u8,
        max_per_cts: u8,
        pgn: u32,
    },
    Cts {
        count: u8,
        next: u8,
        pgn: u32,
    },
    Eom {
        size: u16,
        frames: u8,
        pgn: u32,
    },
    Bam {
        size: u16,
        frames: u8,
        pgn: u32,
    },
    Abort {
        reason: AbortReason,
        pgn: u32,
    },
}

impl TpCm {
    /// PGN of the transferred message.
    pub fn pgn(&self) -> u32 {
        match *self {
            TpCm::Rts { pgn, .. }
            | TpCm::Cts { pgn, .. }
            | TpCm::Eom { pgn, .. }
            | TpCm::Bam { pgn, .. }
            | TpCm::Abort { pgn, .. } => pgn,
        }
    }

    pub fn encode(&self) -> [u8; 8] {
        let mut data = [0xFF; 8];
        match *self {
            TpCm::Rts {
                size,
                frames,
                max_per_cts,
                ..
            } => {
                data[0] = CONTROL_RTS;
                data[1..3].copy_from_slice(&size.to_le_bytes());
                data[3] = frames;
                data[4] = max_per_cts;
            }
            TpCm::Cts { count, next, .. } => {
                data[0] = CONTROL_CTS;
                data[1] = count;
                data[2] = next;
            }
            TpCm::Eom { size, frames, .. } => {
                data[0] = CONTROL_EOM;
                data[1..3].copy_from_slice(&size.to_le_bytes());
                data[3] = frames;
            }
            TpCm::Bam { size, frames, .. } => {
                data[0] = CONTROL_BAM;
                data[1..3].copy_from_slice(&size.to_le_bytes());
                data[3] = frames;
            }
            TpCm::Abort { reason, .. } => {
                data[0] = CONTROL_ABORT;
                data[1] = reason as u8;
            }
        }
        let pgn = self.pgn().to_le_bytes();
        data[5..8].copy_from_slice(&pgn[..3]);
        data
    }

    /// Decode a TP.CM payload. Unknown control bytes and short frames give `None`.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        let size = u16::from_le_bytes([data[1], data[2]]);
        let pgn = u32::from_le_bytes([data[5], data[6], data[7], 0]);
        let message = match data[0] {
            CONTROL_RTS => TpCm::Rts {
                size,
                frames: data[3],
                max_per_cts: data[4],
                pgn,
            },
            CONTROL_CTS => TpCm::Cts {
                count: data[1],
                next: data[2],
                pgn,
            },
            CONTROL_EOM => TpCm::Eom {
                size,
                frames: data[3],
                pgn,
            },
            CONTROL_BAM => TpCm::Bam {
                size,
                frames: data[3],
                pgn,
            },
            CONTROL_ABORT => TpCm::Abort {
                reason: AbortReason::from(data[1]),
                pgn,
            },
            _ => return None,
        };
        Some(message)
    }

    /// DOB state that sends this message.
    fn state(&self) -> DobState {
        match self {
            TpCm::Rts { .. } | TpCm::Bam { .. } => DobState::Rts,
            TpCm::Cts { .. } => DobState::Cts,
            TpCm::Eom { .. } => DobState::Eom,
            TpCm::Abort { .. } => DobState::Abort,
        }
    }

    /// Control DOB carrying this message from `source` to `destination`.
    pub fn into_dob(self, source: u8, destination: u8, port: u8, ttl_ticks: i32) -> Dob {
        let mut dob = Dob::control(
            TP_CM_PGN,
            TP_CM_PRIORITY,
            source,
            destination,
            &self.encode(),
            self.state(),
            ttl_ticks,
        );
        dob.port = port;
        dob.flags.set(DobFlags::VIP);
        dob
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
