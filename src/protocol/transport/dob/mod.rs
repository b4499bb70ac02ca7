//! Transfer objects ("DOBs"): one per message in flight, in either direction.
//!
//! A DOB carries the addressing of a PGN, its payload (inline, on the bounded heap
//! or borrowed from flash), the progress of its transport protocol and a countdown
//! ticker. The stack polls [`Dob::output_status`] every tick and reacts to the
//! disposition: write the next frame, check the transmit status, or dispose.
use crate::infra::heap::{Heap, HeapHandle};
use crate::protocol::transport::{
    can_frame::CanFrame,
    can_id::CanId,
    fast_packet,
    multipacket::{TP_DT_PGN, TP_DT_PRIORITY},
    traits::can_driver::{CanDriver, SendStatus, TxHandle},
    GLOBAL_ADDRESS,
};

//==================================================================================DOB_STATE
/// Transport progress of a DOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DobState {
    /// Idle: freshly built, or receiving with a live ticker.
    Empty,
    /// Control frame TP.CM RTS/BAM ready.
    Rts,
    /// Control frame TP.CM CTS ready.
    Cts,
    /// Control frame TP.CM EOM ready.
    Eom,
    /// Payload frame ready.
    Data,
    /// Control frame TP.CM Abort ready.
    Abort,
    /// Waiting for an external event or for the ticker.
    Wait,
    /// Every frame was handed to the driver; transmit status pending.
    Status,
    /// Terminal.
    Complete,
}

/// What the stack should do with a DOB this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputStatus {
    /// Nothing to do.
    Ok,
    /// A frame is ready for [`Dob::write`].
    FrameReady,
    /// Transmit status must be checked with [`Dob::do_status`].
    Status,
    /// Finished; hand to the role handler then dispose.
    Delete,
    /// The ticker expired.
    TimedOut,
}

/// Who handles the completion of a DOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DobRole {
    /// Application transmit; completion goes to `StackHooks::on_transfer_done`.
    AppTx,
    /// Fast Packet reassembly.
    FastPacketRx,
    /// ISO multipacket reassembly.
    MultipacketRx,
    /// Stack-generated frame (claims, acknowledgements, TP.CM control).
    Control,
}

/// Final outcome of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferOutcome {
    InProgress,
    Success,
    /// The driver refused a frame.
    FrameTransmitError,
    TimedOut,
    /// The peer (or the stack) aborted the session with this reason code.
    Aborted(u8),
}

//==================================================================================DOB_FLAGS
/// Protocol flags of a DOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DobFlags(pub u8);

impl DobFlags {
    pub const MULTIPACKET: u8 = 0x01;
    pub const FASTPACKET: u8 = 0x02;
    pub const BAM: u8 = 0x04;
    pub const RECV_COMPLETE: u8 = 0x08;
    pub const IS_RECV: u8 = 0x10;
    pub const VIP: u8 = 0x20;
    pub const ABORTED: u8 = 0x40;

    #[inline]
    pub fn has(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    #[inline]
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }
}

//==================================================================================FRAME_BITMAP
/// One bit per frame number (1 to 255) of a reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameBitmap([u8; 32]);

impl FrameBitmap {
    /// Mark `frame` as received. Returns `false` when it was already marked.
    pub fn test_and_set(&mut self, frame: u8) -> bool {
        let (byte, bit) = ((frame / 8) as usize, frame % 8);
        let was_set = self.0[byte] & (1 << bit) != 0;
        self.0[byte] |= 1 << bit;
        !was_set
    }

    pub fn is_set(&self, frame: u8) -> bool {
        self.0[(frame / 8) as usize] & (1 << (frame % 8)) != 0
    }

    /// Whether every frame in `first..=last` is marked.
    pub fn all_set(&self, first: u8, last: u8) -> bool {
        (first..=last).all(|f| self.is_set(f))
    }

    pub fn clear(&mut self) {
        self.0 = [0; 32];
    }
}

//==================================================================================DOB_DATA
/// Payload storage of a DOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DobData {
    Empty,
    /// Up to eight bytes kept inside the DOB.
    Inline([u8; 8], u8),
    /// Bytes owned on the bounded heap; freed with the DOB.
    Heap(HeapHandle),
    /// Borrowed constant payload (zero copy).
    Static(&'static [u8]),
}

//==================================================================================DOB
/// A message in flight.
#[derive(Debug, Clone)]
pub struct Dob {
    pub pgn: u32,
    /// Group-function discriminator of proprietary PGNs, `None` when not relevant.
    pub group_function: Option<u8>,
    pub source: u8,
    pub destination: u8,
    pub port: u8,
    pub priority: u8,
    pub data: DobData,
    /// Total payload length in bytes.
    pub len: u16,
    /// Bytes already sent or received.
    pub position: u16,
    /// Next frame number to write (or expected next frame when receiving).
    pub current_frame: u8,
    pub total_frames: u8,
    /// Frames left in the current CTS window (multipacket transmit).
    pub frames_to_send: u8,
    /// Frames still granted to the peer before the next CTS (multipacket receive).
    pub window_left: u8,
    /// Max frames per CTS announced by the sender in its RTS.
    pub max_per_cts: u8,
    /// Fast Packet sequence counter (upper three bits of the first data byte).
    pub sequence: u8,
    pub received: FrameBitmap,
    pub flags: DobFlags,
    /// Countdown in ticks; meaning depends on the state.
    pub ticker: i32,
    pub role: DobRole,
    /// Application tag handed back on completion.
    pub tag: Option<u32>,
    pub terminating_status: TransferOutcome,
    pub tx_handle: Option<TxHandle>,
    /// Pool slot this DOB occupies.
    pub slot: Option<u16>,
    pub state: DobState,
}

impl Dob {
    /// Blank DOB for `pgn` with a default lifetime of `ttl_ticks`.
    pub fn new(pgn: u32, priority: u8, role: DobRole, ttl_ticks: i32) -> Self {
        Self {
            pgn,
            group_function: None,
            source: 0,
            destination: GLOBAL_ADDRESS,
            port: 0,
            priority: priority & 0x07,
            data: DobData::Empty,
            len: 0,
            position: 0,
            current_frame: 0,
            total_frames: 0,
            frames_to_send: 0,
            window_left: 0,
            max_per_cts: 0,
            sequence: 0,
            received: FrameBitmap::default(),
            flags: DobFlags::default(),
            ticker: ttl_ticks,
            role,
            tag: None,
            terminating_status: TransferOutcome::InProgress,
            tx_handle: None,
            slot: None,
            state: DobState::Empty,
        }
    }

    /// Stack-generated single frame (TP.CM, claim, ACK…) in the given state.
    pub fn control(
        pgn: u32,
        priority: u8,
        source: u8,
        destination: u8,
        payload: &[u8],
        state: DobState,
        ttl_ticks: i32,
    ) -> Self {
        let mut dob = Self::new(pgn, priority, DobRole::Control, ttl_ticks);
        dob.source = source;
        dob.destination = destination;
        dob.set_inline(payload);
        dob.state = state;
        dob
    }

    /// Store up to eight bytes inline.
    pub fn set_inline(&mut self, payload: &[u8]) {
        let len = payload.len().min(8);
        let mut bytes = [0xFF; 8];
        bytes[..len].copy_from_slice(&payload[..len]);
        self.data = DobData::Inline(bytes, len as u8);
        self.len = len as u16;
    }

    /// Whether the payload is owned by the heap and must be freed with the DOB.
    #[inline]
    pub fn data_from_heap(&self) -> Option<HeapHandle> {
        match self.data {
            DobData::Heap(handle) => Some(handle),
            _ => None,
        }
    }

    /// Payload bytes, wherever they live.
    pub fn payload<'a, const H: usize>(&'a self, heap: &'a Heap<H>) -> &'a [u8] {
        match &self.data {
            DobData::Empty => &[],
            DobData::Inline(bytes, len) => &bytes[..*len as usize],
            DobData::Heap(handle) => heap.bytes(*handle),
            DobData::Static(bytes) => bytes,
        }
    }

    /// Peer of the session: the remote source when receiving, the destination otherwise.
    #[inline]
    pub fn peer(&self) -> u8 {
        if self.flags.has(DobFlags::IS_RECV) {
            self.source
        } else {
            self.destination
        }
    }

    //==================================================================================TRANSMIT

    /// Poll the DOB. With `tick` set, waiting states count their ticker down.
    pub fn output_status(&mut self, tick: bool) -> OutputStatus {
        match self.state {
            DobState::Rts | DobState::Cts | DobState::Eom | DobState::Data | DobState::Abort => {
                OutputStatus::FrameReady
            }
            DobState::Status => OutputStatus::Status,
            DobState::Complete => OutputStatus::Delete,
            DobState::Empty if self.ticker == 0 => OutputStatus::Ok,
            DobState::Empty | DobState::Wait => {
                if tick {
                    self.ticker -= 1;
                }
                if self.ticker <= 0 {
                    OutputStatus::TimedOut
                } else {
                    OutputStatus::Ok
                }
            }
        }
    }

    /// Build the next frame and hand it to the driver.
    ///
    /// On `Busy` the DOB is left untouched so the same frame is retried later. A frame
    /// that cannot be built ends the DOB like a driver error.
    pub fn write<const H: usize, D: CanDriver>(
        &mut self,
        heap: &Heap<H>,
        driver: &mut D,
    ) -> Result<(), SendStatus> {
        let saved = (self.position, self.current_frame);

        let Some(frame) = self.build_frame(heap) else {
            #[cfg(feature = "defmt")]
            defmt::warn!("no frame can carry pgn {}", self.pgn);
            self.state = DobState::Complete;
            self.terminating_status = TransferOutcome::FrameTransmitError;
            return Err(SendStatus::Error);
        };

        match driver.send_frame(self.port, &frame) {
            Ok(handle) => {
                self.tx_handle = Some(handle);
                if self.flags.has(DobFlags::MULTIPACKET) {
                    self.frames_to_send = self.frames_to_send.saturating_sub(1);
                    self.state = if self.frames_to_send > 0 {
                        DobState::Data
                    } else {
                        DobState::Wait
                    };
                } else if self.flags.has(DobFlags::FASTPACKET) && self.position < self.len {
                    self.state = DobState::Data;
                } else {
                    self.state = DobState::Status;
                    self.ticker = 0;
                }
                Ok(())
            }
            Err(SendStatus::Busy) => {
                (self.position, self.current_frame) = saved;
                Err(SendStatus::Busy)
            }
            Err(SendStatus::Error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("frame refused by driver, pgn {}", self.pgn);
                self.state = DobState::Complete;
                self.terminating_status = TransferOutcome::FrameTransmitError;
                Err(SendStatus::Error)
            }
        }
    }

    /// Check the transmit status once every frame was written.
    ///
    /// While the driver still holds the frame the DOB stays in `Status`.
    pub fn do_status<D: CanDriver>(&mut self, driver: &D) {
        if self.ticker != 0 {
            self.state = DobState::Wait;
            return;
        }
        let pending = self
            .tx_handle
            .is_some_and(|handle| driver.tx_pending(self.port, handle));
        if !pending {
            self.state = DobState::Complete;
            if self.terminating_status == TransferOutcome::InProgress {
                self.terminating_status = TransferOutcome::Success;
            }
        }
    }

    /// Frame for the current position, advancing the cursors.
    fn build_frame<const H: usize>(&mut self, heap: &Heap<H>) -> Option<CanFrame> {
        if self.flags.has(DobFlags::MULTIPACKET) {
            return self.build_transfer_frame(heap);
        }

        let id = CanId::for_pgn(self.pgn, self.priority, self.source, self.destination).ok()?;
        let payload = self.payload(heap);

        if self.flags.has(DobFlags::FASTPACKET) {
            let (frame_data, used) = fast_packet::encode_frame(
                self.sequence,
                self.current_frame,
                payload,
                self.position as usize,
            );
            self.position += used as u16;
            self.current_frame = self.current_frame.wrapping_add(1);
            return Some(CanFrame::with_payload(id, &frame_data));
        }

        let len = payload.len().min(8);
        let frame = CanFrame::with_payload(id, &payload[..len]);
        self.position = len as u16;
        self.current_frame = 1;
        Some(frame)
    }

    /// TP.DT frame `current_frame`: `[n, 7 bytes]`, padded with 0xFF.
    fn build_transfer_frame<const H: usize>(&mut self, heap: &Heap<H>) -> Option<CanFrame> {
        if self.frames_to_send == 0 || self.current_frame == 0 {
            return None;
        }
        let destination = if self.flags.has(DobFlags::BAM) {
            GLOBAL_ADDRESS
        } else {
            self.destination
        };
        let id = CanId::for_pgn(TP_DT_PGN, TP_DT_PRIORITY, self.source, destination).ok()?;

        let payload = self.payload(heap);
        let offset = (self.current_frame as usize - 1) * 7;
        if offset >= payload.len() {
            return None;
        }
        let chunk = &payload[offset..(offset + 7).min(payload.len())];

        let mut data = [0xFF; 8];
        data[0] = self.current_frame;
        data[1..1 + chunk.len()].copy_from_slice(chunk);

        self.position = (offset + chunk.len()) as u16;
        self.current_frame = self.current_frame.wrapping_add(1);
        Some(CanFrame {
            id,
            data,
            len: 8,
        })
    }

    /// Reset the reassembly bitmap and cursors before a new session.
    pub fn reset_reception(&mut self) {
        self.received.clear();
        self.position = 0;
        self.current_frame = 1;
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
