//! Receiving side of a multipacket transfer: RTS/BAM sessions and TP.DT reassembly.
use super::{AbortReason, MultipacketTimers, TpCm, MAX_MULTIPACKET_PAYLOAD, MP_DATA_SIZE};
use crate::error::HeapError;
use crate::infra::heap::Heap;
use crate::protocol::transport::dob::{Dob, DobData, DobFlags, DobRole, DobState};

/// Addressing of the frame opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKey {
    /// Sender of the transfer.
    pub source: u8,
    /// Our address, or global for a BAM.
    pub destination: u8,
    pub port: u8,
}

/// Result of one TP.DT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataOutcome {
    /// Stored; more frames are expected in this window.
    Consumed,
    /// Frame already received; counters unchanged.
    Duplicate,
    /// The window is exhausted; send this CTS to request the next one.
    WindowDone(TpCm),
    /// Every frame arrived. Unicast sessions confirm with the EOM.
    Complete(Option<TpCm>),
    /// Wrong sequence or length; the session is dropped.
    Abort(AbortReason),
}

/// Frames granted by the next CTS.
fn grant(dob: &Dob, window: u8) -> u8 {
    let remaining = dob.total_frames.saturating_sub(dob.current_frame) + 1;
    let sender_max = if dob.max_per_cts == 0 {
        u8::MAX
    } else {
        dob.max_per_cts
    };
    window.max(1).min(sender_max).min(remaining)
}

fn new_session<const H: usize>(
    key: SessionKey,
    pgn: u32,
    size: u16,
    frames: u8,
    heap: &mut Heap<H>,
) -> Result<Dob, HeapError> {
    let handle = heap.allocate(size as usize)?;
    heap.bytes_mut(handle).fill(0);

    let mut dob = Dob::new(pgn, 7, DobRole::MultipacketRx, 0);
    dob.source = key.source;
    dob.destination = key.destination;
    dob.port = key.port;
    dob.data = DobData::Heap(handle);
    dob.len = size;
    dob.total_frames = frames;
    dob.flags.set(DobFlags::MULTIPACKET | DobFlags::IS_RECV);
    dob.reset_reception();
    dob.state = DobState::Wait;
    Ok(dob)
}

fn valid_size(size: u16, frames: u8) -> bool {
    size > 0
        && frames > 0
        && size as usize <= MAX_MULTIPACKET_PAYLOAD
        && size as usize <= frames as usize * MP_DATA_SIZE
}

/// Open a unicast session from an RTS and build the first CTS.
///
/// On refusal the caller answers with an Abort carrying the returned reason.
pub fn on_rts<const H: usize>(
    key: SessionKey,
    rts: TpCm,
    window: u8,
    heap: &mut Heap<H>,
    timers: &MultipacketTimers,
) -> Result<(Dob, TpCm), AbortReason> {
    let TpCm::Rts {
        size,
        frames,
        max_per_cts,
        pgn,
    } = rts
    else {
        return Err(AbortReason::Unspecified);
    };
    if !valid_size(size, frames) {
        return Err(AbortReason::BadSize);
    }

    let mut dob = new_session(key, pgn, size, frames, heap).map_err(|_| AbortReason::Resources)?;
    dob.max_per_cts = max_per_cts;
    dob.window_left = grant(&dob, window);
    dob.ticker = timers.rts_wait;

    let cts = TpCm::Cts {
        count: dob.window_left,
        next: 1,
        pgn,
    };
    Ok((dob, cts))
}

/// Open a broadcast session from a BAM.
pub fn on_bam<const H: usize>(
    key: SessionKey,
    bam: TpCm,
    heap: &mut Heap<H>,
    timers: &MultipacketTimers,
) -> Option<Dob> {
    let TpCm::Bam { size, frames, pgn } = bam else {
        return None;
    };
    if !valid_size(size, frames) {
        return None;
    }
    let mut dob = new_session(key, pgn, size, frames, heap).ok()?;
    dob.flags.set(DobFlags::BAM);
    dob.window_left = frames;
    dob.ticker = timers.data_wait;
    Some(dob)
}

/// Store one TP.DT frame into its session.
pub fn on_data<const H: usize>(
    dob: &mut Dob,
    data: &[u8],
    window: u8,
    heap: &mut Heap<H>,
    timers: &MultipacketTimers,
) -> DataOutcome {
    if data.len() != 8 {
        return abort(dob, AbortReason::UnexpectedData);
    }
    let frame = data[0];
    if frame > 0 && dob.received.is_set(frame) {
        return DataOutcome::Duplicate;
    }
    if frame != dob.current_frame || frame == 0 || frame > dob.total_frames {
        return abort(dob, AbortReason::BadSequence);
    }
    let handle = match dob.data_from_heap() {
        Some(handle) => handle,
        None => return abort(dob, AbortReason::Resources),
    };

    let offset = (frame as usize - 1) * MP_DATA_SIZE;
    let used = (dob.len as usize).saturating_sub(offset).min(MP_DATA_SIZE);
    heap.bytes_mut(handle)[offset..offset + used].copy_from_slice(&data[1..1 + used]);
    dob.received.test_and_set(frame);
    dob.position = (offset + used) as u16;
    dob.current_frame = dob.current_frame.wrapping_add(1);
    dob.window_left = dob.window_left.saturating_sub(1);
    dob.ticker = timers.data_wait;

    if frame == dob.total_frames && dob.received.all_set(1, dob.total_frames) {
        dob.flags.set(DobFlags::RECV_COMPLETE);
        dob.state = DobState::Complete;
        if dob.flags.has(DobFlags::BAM) {
            return DataOutcome::Complete(None);
        }
        return DataOutcome::Complete(Some(TpCm::Eom {
            size: dob.len,
            frames: dob.total_frames,
            pgn: dob.pgn,
        }));
    }

    if !dob.flags.has(DobFlags::BAM) && dob.window_left == 0 {
        dob.window_left = grant(dob, window);
        dob.ticker = timers.rts_wait;
        return DataOutcome::WindowDone(TpCm::Cts {
            count: dob.window_left,
            next: dob.current_frame,
            pgn: dob.pgn,
        });
    }

    DataOutcome::Consumed
}

fn abort(dob: &mut Dob, reason: AbortReason) -> DataOutcome {
    #[cfg(feature = "defmt")]
    defmt::debug!("multipacket rx abort pgn {}: {}", dob.pgn, reason);
    dob.flags.set(DobFlags::ABORTED);
    dob.state = DobState::Complete;
    DataOutcome::Abort(reason)
}
