//! RV-C / NMEA 2000 transport layer: CAN frame representations, 29-bit identifier
//! management, transfer objects and their pools, Fast Packet and ISO multipacket
//! (TP.CM / TP.DT) transport, and bus abstraction traits.
//!
//! ## Transport timing constants
//!
//! Every timeout below is expressed in milliseconds and converted to stack ticks
//! with a ceiling division (see [`ms_to_ticks`]).

pub mod can_frame;
pub mod can_id;
pub mod dob;
pub mod fast_packet;
pub mod multipacket;
pub mod pool;
pub mod traits;

/// Destination address meaning "every node".
pub const GLOBAL_ADDRESS: u8 = 255;
/// Source address of a node that could not claim an address.
pub const NULL_ADDRESS: u8 = 254;

/// Default lifetime of a queued transfer object before it is dropped (ms).
pub const PGN_TTL_MS: u32 = 1250;

/// Pacing between two TP.DT frames of a broadcast (BAM) transfer (ms).
///
/// ISO 11783-3 asks for 50 to 200 ms between BAM data frames so that receivers
/// with a single reassembly buffer can keep up.
pub const BAM_FRAME_INTERVAL_MS: u32 = 50;

/// Time a sender waits for a CTS after an RTS or after the last frame of a window (ms).
pub const CTS_WAIT_MS: u32 = 1250;

/// Time a receiver waits between two TP.DT frames (ms).
pub const DATA_WAIT_MS: u32 = 250;

/// Time a receiver keeps an RTS session open while waiting for its first data frame (ms).
pub const RTS_WAIT_MS: u32 = 1250;

/// Hold-off after a CTS granting zero frames (ms).
pub const CTS_HOLD_MS: u32 = 550;

/// Time a Fast Packet reassembly waits for the next frame (ms).
pub const FAST_PACKET_WAIT_MS: u32 = 750;

/// Recommended timeout for sending a single CAN frame (ms).
///
/// Prevents indefinite blocking when the bus is faulty, disconnected, or saturated.
///
/// # Timeout rationale
///
/// On an RV-C bus @ 250 kbps with CAN arbitration:
/// - Maximum time for one frame (8 bytes): ~0.5 ms (no contention)
/// - With arbitration and retransmissions: ~10–20 ms
/// - Safety margin ×5 → 100 ms
///
/// # Implementation notes
///
/// [`CanBus`](traits::can_bus::CanBus) implementations **SHOULD**
/// enforce a timeout on `send()` to avoid infinite waits.
///
/// # Example
///
/// ```rust,ignore
/// use embassy_time::{with_timeout, Duration};
/// use korri_rvc::protocol::transport::CAN_SEND_TIMEOUT_MS;
///
/// async fn send_with_timeout(&mut self, frame: &CanFrame) -> Result<(), Error> {
///     with_timeout(
///         Duration::from_millis(CAN_SEND_TIMEOUT_MS as u64),
///         self.can.transmit_async(&twai_frame)
///     )
///     .await
///     .map_err(|_| Error::Timeout)?
/// }
/// ```
pub const CAN_SEND_TIMEOUT_MS: u32 = 100;

/// Convert a millisecond timeout to ticks, rounding up so a timer never fires early.
#[inline]
pub fn ms_to_ticks(ms: u32, ms_per_tick: u32) -> i32 {
    let per_tick = ms_per_tick.max(1);
    ms.div_ceil(per_tick).min(i32::MAX as u32) as i32
}
