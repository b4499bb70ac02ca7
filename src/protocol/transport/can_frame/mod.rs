//! In-memory representation of an SAE J1939 / RV-C CAN frame.
use crate::protocol::transport::can_id::CanId;
use embedded_can::{ExtendedId, Id};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw RV-C frame as read from the CAN bus.
pub struct CanFrame {
    /// Full 29-bit CAN identifier stored inside a `u32`.
    pub id: CanId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Build a frame from up to eight bytes; unused bytes are set to `0xFF`.
    pub fn with_payload(id: CanId, payload: &[u8]) -> Self {
        let len = payload.len().min(8);
        let mut data = [0xFF; 8];
        data[..len].copy_from_slice(&payload[..len]);
        Self { id, data, len }
    }

    /// Valid payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        match id.into() {
            Id::Extended(ext) => Some(Self::with_payload(CanId(ext.as_raw()), data)),
            // 11-bit identifiers have no meaning on RV-C
            Id::Standard(_) => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        match ExtendedId::new(self.id.0 & ExtendedId::MAX.as_raw()) {
            Some(ext) => Id::Extended(ext),
            None => Id::Extended(ExtendedId::ZERO),
        }
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
