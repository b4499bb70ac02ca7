//! NMEA 2000 Fast Packet assembler: rebuilds application messages by
//! aggregating the CAN frames of a session into a receive [`Dob`].
//!
//! A session is keyed by (PGN, source, sequence). Frame 0 opens it and reserves the
//! whole payload on the heap; each following frame must carry the next frame index.
use super::{frame_count, FIRST_FRAME_DATA, MAX_FAST_PACKET_PAYLOAD, NEXT_FRAME_DATA};
use crate::error::FastPacketError;
use crate::infra::heap::Heap;
use crate::protocol::transport::dob::{Dob, DobData, DobFlags, DobRole, DobState};

//==================================================================================Enums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProcessResult {
    /// Frame does not continue the session (wrong index or session already complete).
    Ignored,
    /// Frame index already received; the counters are unchanged.
    Duplicate,
    /// Frame successfully integrated but additional fragments are still missing.
    FragmentConsumed,
    /// All expected fragments were received; the payload is available on the DOB.
    MessageComplete,
}

/// Addressing of the frame opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKey {
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
    pub port: u8,
    pub priority: u8,
}

/// Sequence bits of a Fast Packet frame, as stored on the receive DOB.
#[inline]
pub fn sequence_of(data: &[u8]) -> u8 {
    data.first().map_or(0, |b| b & 0xE0)
}

/// Whether `dob` is the reassembly of (`pgn`, `source`) with the sequence of `data`.
pub fn matches(dob: &Dob, pgn: u32, source: u8, data: &[u8]) -> bool {
    dob.role == DobRole::FastPacketRx
        && dob.pgn == pgn
        && dob.source == source
        && dob.sequence == sequence_of(data)
}

//==================================================================================Process Functions
/// Open a reassembly from frame 0.
///
/// The payload buffer is allocated on `heap` and owned by the returned DOB.
/// `wait_ticks` is the inter-frame timeout.
pub fn open<const H: usize>(
    key: SessionKey,
    data: &[u8],
    heap: &mut Heap<H>,
    wait_ticks: i32,
) -> Result<(Dob, ProcessResult), FastPacketError> {
    if data.len() != 8 {
        return Err(FastPacketError::InvalidLength { len: data.len() });
    }
    let index = data[0] & 0x1F;
    if index != 0 {
        return Err(FastPacketError::NoSession { index });
    }
    let declared = data[1];
    if declared == 0 || declared as usize > MAX_FAST_PACKET_PAYLOAD {
        return Err(FastPacketError::InvalidDeclaredLength { declared });
    }

    let handle = heap.allocate(declared as usize)?;
    let used = (declared as usize).min(FIRST_FRAME_DATA);
    heap.bytes_mut(handle)[..used].copy_from_slice(&data[2..2 + used]);

    let mut dob = Dob::new(key.pgn, key.priority, DobRole::FastPacketRx, wait_ticks);
    dob.source = key.source;
    dob.destination = key.destination;
    dob.port = key.port;
    dob.data = DobData::Heap(handle);
    dob.len = declared as u16;
    dob.position = used as u16;
    dob.sequence = sequence_of(data);
    dob.total_frames = frame_count(declared as usize);
    dob.flags.set(DobFlags::FASTPACKET | DobFlags::IS_RECV);
    dob.received.test_and_set(0);
    dob.current_frame = 1;

    let result = if dob.current_frame >= dob.total_frames {
        dob.flags.set(DobFlags::RECV_COMPLETE);
        dob.state = DobState::Complete;
        ProcessResult::MessageComplete
    } else {
        ProcessResult::FragmentConsumed
    };

    #[cfg(feature = "defmt")]
    defmt::trace!(
        "fast packet open pgn {} from {}: {} bytes",
        key.pgn,
        key.source,
        declared
    );

    Ok((dob, result))
}

/// Add a continuation frame to an open reassembly.
///
/// `wait_ticks` re-arms the inter-frame timeout.
pub fn accept_frame<const H: usize>(
    dob: &mut Dob,
    data: &[u8],
    heap: &mut Heap<H>,
    wait_ticks: i32,
) -> ProcessResult {
    if data.len() != 8 || dob.flags.has(DobFlags::RECV_COMPLETE) {
        return ProcessResult::Ignored;
    }
    let handle = match dob.data_from_heap() {
        Some(handle) => handle,
        None => return ProcessResult::Ignored,
    };

    let index = data[0] & 0x1F;
    if dob.received.is_set(index) {
        return ProcessResult::Duplicate;
    }
    if index != dob.current_frame {
        return ProcessResult::Ignored;
    }
    dob.received.test_and_set(index);

    let position = dob.position as usize;
    let used = (dob.len as usize).saturating_sub(position).min(NEXT_FRAME_DATA);
    heap.bytes_mut(handle)[position..position + used].copy_from_slice(&data[1..1 + used]);
    dob.position += used as u16;
    dob.current_frame = dob.current_frame.wrapping_add(1);
    dob.ticker = wait_ticks;

    if dob.current_frame >= dob.total_frames && dob.received.all_set(0, dob.total_frames - 1) {
        dob.flags.set(DobFlags::RECV_COMPLETE);
        dob.state = DobState::Complete;
        ProcessResult::MessageComplete
    } else {
        ProcessResult::FragmentConsumed
    }
}
