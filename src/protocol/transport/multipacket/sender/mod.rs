//! Sending side of a multipacket transfer.
use super::{frames_for, AbortReason, MultipacketTimers, TpCm};
use crate::protocol::transport::dob::{Dob, DobFlags, DobRole, DobState, TransferOutcome};
use crate::protocol::transport::GLOBAL_ADDRESS;

/// Reaction of a sender to a CTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CtsOutcome {
    /// The granted frames are ready to go.
    Send,
    /// Zero frames granted; the sender waits for another CTS.
    Hold,
    /// The window does not fit the transfer; abort the session.
    Abort(AbortReason),
}

/// What to do with a sending DOB whose ticker expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxTimeout {
    /// Next broadcast frame scheduled; keep the DOB.
    Continue,
    /// Every broadcast frame left.
    Done,
    /// The peer stopped answering.
    Failed,
}

/// Whether `other` is an own multipacket transmit that is still in progress.
///
/// Only one own session may be open at a time.
pub fn is_open_session(other: &Dob, my_address: u8) -> bool {
    other.role == DobRole::AppTx
        && other.flags.has(DobFlags::MULTIPACKET)
        && other.source == my_address
        && other.total_frames > 0
        && matches!(other.state, DobState::Wait | DobState::Data)
}

/// Open the session of `dob` and return the RTS or BAM announcing it.
///
/// The DOB waits for the CTS (unicast) or for the first pacing interval (broadcast).
pub fn start_tx(dob: &mut Dob, max_per_cts: u8, timers: &MultipacketTimers) -> TpCm {
    let frames = frames_for(dob.len as usize);
    dob.current_frame = 1;
    dob.total_frames = frames;
    dob.frames_to_send = 0;
    dob.tx_handle = None;
    dob.state = DobState::Wait;

    if dob.destination == GLOBAL_ADDRESS {
        dob.flags.set(DobFlags::BAM);
        dob.ticker = timers.bam_interval;
        TpCm::Bam {
            size: dob.len,
            frames,
            pgn: dob.pgn,
        }
    } else {
        dob.flags.clear(DobFlags::BAM);
        dob.ticker = timers.cts_wait;
        TpCm::Rts {
            size: dob.len,
            frames,
            max_per_cts,
            pgn: dob.pgn,
        }
    }
}

/// Apply a CTS granting `count` frames starting at `next`.
pub fn on_cts(dob: &mut Dob, count: u8, next: u8, timers: &MultipacketTimers) -> CtsOutcome {
    let last = next as u16 + count as u16;
    if next == 0 || last.saturating_sub(1) > dob.total_frames as u16 {
        #[cfg(feature = "defmt")]
        defmt::warn!("CTS out of range: {} frames from {}", count, next);
        dob.terminating_status = TransferOutcome::Aborted(AbortReason::BadSequence as u8);
        dob.flags.set(DobFlags::ABORTED);
        dob.state = DobState::Complete;
        return CtsOutcome::Abort(AbortReason::BadSequence);
    }

    if count == 0 {
        dob.ticker = timers.cts_hold;
        return CtsOutcome::Hold;
    }

    dob.current_frame = next;
    dob.frames_to_send = count;
    dob.ticker = timers.cts_wait;
    dob.state = DobState::Data;
    CtsOutcome::Send
}

/// The receiver confirmed the whole message.
pub fn on_eom(dob: &mut Dob) {
    dob.terminating_status = TransferOutcome::Success;
    dob.state = DobState::Complete;
}

/// The peer gave up the session.
pub fn on_abort(dob: &mut Dob, reason: AbortReason) {
    dob.flags.set(DobFlags::ABORTED);
    dob.terminating_status = TransferOutcome::Aborted(reason as u8);
    dob.state = DobState::Complete;
}

/// Ticker expiry of a sending DOB.
///
/// Broadcasts use the ticker as their pacing clock; unicast transfers fail.
pub fn on_tx_timeout(dob: &mut Dob, timers: &MultipacketTimers) -> TxTimeout {
    if dob.flags.has(DobFlags::BAM) && dob.total_frames > 0 {
        if dob.current_frame <= dob.total_frames {
            dob.frames_to_send = 1;
            dob.state = DobState::Data;
            dob.ticker = timers.bam_interval;
            return TxTimeout::Continue;
        }
        dob.terminating_status = TransferOutcome::Success;
        dob.state = DobState::Complete;
        return TxTimeout::Done;
    }
    dob.terminating_status = TransferOutcome::TimedOut;
    dob.state = DobState::Complete;
    TxTimeout::Failed
}
