//! Transport metadata per PGN: how the pump frames, reassembles and prioritises it.
use super::{Pgn126720, Pgn130816, Pgn59392, Pgn59904, Pgn60928, Pgn65240};
use crate::core::{PgnDescriptor, SINGLE_FRAME_LEN};

/// Framing used for a PGN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transport {
    /// At most 8 bytes, one frame.
    Single,
    /// NMEA 2000 fast-packet, up to 223 bytes.
    FastPacket,
    /// ISO TP.CM/TP.DT, up to 1785 bytes.
    Multipacket,
}

/// Registry entry for one PGN.
#[derive(Debug, Clone, Copy)]
pub struct PgnInfo {
    pub pgn: u32,
    pub priority: u8,
    pub transport: Transport,
    pub descriptor: Option<&'static PgnDescriptor>,
}

impl PgnInfo {
    /// Entry derived from a codec descriptor.
    ///
    /// Descriptors that do not fit one frame and are not fast-packet use multipacket.
    pub const fn from_descriptor(descriptor: &'static PgnDescriptor) -> Self {
        let transport = if descriptor.fastpacket {
            Transport::FastPacket
        } else if fixed_bytes(descriptor) > SINGLE_FRAME_LEN {
            Transport::Multipacket
        } else {
            Transport::Single
        };
        Self {
            pgn: descriptor.id,
            priority: descriptor.priority,
            transport,
            descriptor: Some(descriptor),
        }
    }

    /// Entry without a descriptor; the payload is opaque to the stack.
    pub const fn raw(pgn: u32, priority: u8, transport: Transport) -> Self {
        Self {
            pgn,
            priority,
            transport,
            descriptor: None,
        }
    }

    pub const fn is_fast_packet(&self) -> bool {
        matches!(self.transport, Transport::FastPacket)
    }
}

const fn fixed_bytes(descriptor: &PgnDescriptor) -> usize {
    let mut bits = 0usize;
    let mut i = 0;
    while i < descriptor.fields.len() {
        if let Some(len) = descriptor.fields[i].bits_length {
            bits += len as usize;
        }
        i += 1;
    }
    bits.div_ceil(8)
}

/// PGNs handled by the stack itself.
pub static STACK_PGNS: [PgnInfo; 6] = [
    PgnInfo::from_descriptor(&Pgn59392::PGN_59392_DESCRIPTOR),
    PgnInfo::from_descriptor(&Pgn59904::PGN_59904_DESCRIPTOR),
    PgnInfo::from_descriptor(&Pgn60928::PGN_60928_DESCRIPTOR),
    PgnInfo::from_descriptor(&Pgn65240::PGN_65240_DESCRIPTOR),
    PgnInfo::from_descriptor(&Pgn126720::PGN_126720_DESCRIPTOR),
    PgnInfo::from_descriptor(&Pgn130816::PGN_130816_DESCRIPTOR),
];

/// Find `pgn`, application table first.
pub fn lookup(table: &'static [PgnInfo], pgn: u32) -> Option<&'static PgnInfo> {
    table
        .iter()
        .chain(STACK_PGNS.iter())
        .find(|info| info.pgn == pgn)
}

/// Transport for an outgoing payload: the registry decides, else the length does.
pub fn transport_for(table: &'static [PgnInfo], pgn: u32, len: usize) -> Transport {
    match lookup(table, pgn) {
        Some(info) if info.transport != Transport::Single || len <= SINGLE_FRAME_LEN => {
            info.transport
        }
        _ if len <= SINGLE_FRAME_LEN => Transport::Single,
        _ => Transport::Multipacket,
    }
}
