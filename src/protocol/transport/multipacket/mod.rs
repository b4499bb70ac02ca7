//! ISO 11783-3 / J1939-21 transport protocol: TP.CM connection management and TP.DT
//! data frames.
//!
//! Payloads up to 1785 bytes are cut into frames of seven bytes numbered from 1.
//! A unicast transfer is paced by the receiver with RTS/CTS/EOM; a broadcast is
//! announced with a BAM and then sent at a fixed interval.
//!
//! The functions of [`sender`] and [`receiver`] only mutate the DOB they are given and
//! return the control message to emit. Session lookup, pools and statistics belong to
//! the frame pump.
use crate::protocol::transport::{
    ms_to_ticks, BAM_FRAME_INTERVAL_MS, CTS_HOLD_MS, CTS_WAIT_MS, DATA_WAIT_MS, RTS_WAIT_MS,
};

pub mod control;
pub mod receiver;
pub mod sender;

pub use control::{AbortReason, TpCm};

/// TP.CM connection management.
pub const TP_CM_PGN: u32 = 60416;
/// TP.DT data transfer.
pub const TP_DT_PGN: u32 = 60160;
/// Priority of TP.CM frames.
pub const TP_CM_PRIORITY: u8 = 7;
/// Priority of TP.DT frames.
pub const TP_DT_PRIORITY: u8 = 7;

/// Payload bytes per TP.DT frame.
pub const MP_DATA_SIZE: usize = 7;
/// 255 frames of seven bytes.
pub const MAX_MULTIPACKET_PAYLOAD: usize = 1785;

/// Number of TP.DT frames needed for `len` bytes.
#[inline]
pub fn frames_for(len: usize) -> u8 {
    len.div_ceil(MP_DATA_SIZE).min(u8::MAX as usize) as u8
}

/// Transport timeouts converted to ticks once per configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipacketTimers {
    /// Sender waiting for a CTS.
    pub cts_wait: i32,
    /// Sender on hold after a zero-frame CTS.
    pub cts_hold: i32,
    /// Receiver waiting for the first frame of a window.
    pub rts_wait: i32,
    /// Receiver waiting between two frames.
    pub data_wait: i32,
    /// Pacing of broadcast data frames.
    pub bam_interval: i32,
}

impl MultipacketTimers {
    pub fn new(ms_per_tick: u32) -> Self {
        Self {
            cts_wait: ms_to_ticks(CTS_WAIT_MS, ms_per_tick),
            cts_hold: ms_to_ticks(CTS_HOLD_MS, ms_per_tick),
            rts_wait: ms_to_ticks(RTS_WAIT_MS, ms_per_tick),
            data_wait: ms_to_ticks(DATA_WAIT_MS, ms_per_tick),
            bam_interval: ms_to_ticks(BAM_FRAME_INTERVAL_MS, ms_per_tick),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Frame counts round up to whole seven-byte frames.
    fn test_frames_for() {
        assert_eq!(frames_for(9), 2);
        assert_eq!(frames_for(14), 2);
        assert_eq!(frames_for(20), 3);
        assert_eq!(frames_for(MAX_MULTIPACKET_PAYLOAD), 255);
    }

    #[test]
    /// Timers follow the tick period.
    fn test_timers() {
        let timers = MultipacketTimers::new(10);
        assert_eq!(timers.cts_wait, 125);
        assert_eq!(timers.cts_hold, 55);
        assert_eq!(timers.data_wait, 25);
        assert_eq!(timers.bam_interval, 5);
    }
}
