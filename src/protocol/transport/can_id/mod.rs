//! Creation and extraction of the 29-bit CAN identifiers used by
//! RV-C and NMEA 2000 (derived from the SAE J1939 specification).
use crate::error::CanIdBuildError;
use crate::protocol::transport::GLOBAL_ADDRESS;

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, PGN, destination, and source.
pub struct CanId(pub u32);

impl CanId {
    // Builder entry point
    /// Creates a pre-configured `CanIdBuilder` for a PGN and source address.
    pub fn builder(pgn: u32, source_address: u8) -> CanIdBuilder {
        CanIdBuilder::new(pgn, source_address)
    }

    /// Build the identifier of `pgn`, picking PDU1 or PDU2 from the PGN itself.
    /// PDU2 PGNs ignore `destination`; PDU1 PGNs carry it (255 for a global send).
    pub fn for_pgn(
        pgn: u32,
        priority: u8,
        source_address: u8,
        destination: u8,
    ) -> Result<CanId, CanIdBuildError> {
        let builder = CanIdBuilder::new(pgn, source_address).with_priority(priority);
        if is_pdu1_pgn(pgn) {
            builder.to_destination(destination).build()
        } else {
            builder.build()
        }
    }

    /// Whether the identifier is addressed (PDU1).
    pub fn is_pdu1(&self) -> bool {
        ((self.0 >> 16) & 0xFF) < 240
    }

    /// Destination address, [`GLOBAL_ADDRESS`] for PDU2 identifiers.
    pub fn destination_or_global(&self) -> u8 {
        self.destination().unwrap_or(GLOBAL_ADDRESS)
    }

    // Getters used to deconstruct the identifier
    /// Returns the priority (3 bits, value 0-7) encoded in the CAN ID.
    pub fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }
    /// Extracts the 18-bit PGN, handling the PDU1/PDU2 distinction.
    pub fn pgn(&self) -> u32 {
        let ps = ((self.0 >> 8) & 0xFF) as u8;
        let pf = ((self.0 >> 16) & 0xFF) as u8;
        let dp = (self.0 >> 24) & 0x01;
        let r = (self.0 >> 25) & 0x01;

        if (pf >> 4) & 0xF == 0xF {
            // PDU2: PF >= 240, implicit destination, PS becomes part of the PGN.
            (r << 17) | (dp << 16) | ((pf as u32) << 8) | (ps as u32)
        } else {
            // PDU1: PF < 240, PS stores the explicit destination.
            (r << 17) | (dp << 16) | ((pf as u32) << 8)
        }
    }

    /// Returns the destination address (PDU1) when the PGN requires one.
    pub fn destination(&self) -> Option<u8> {
        let pf = ((self.0 >> 16) & 0xFF) as u8;
        if (pf >> 4) & 0xF == 0xF {
            None
        } else {
            let ps = ((self.0 >> 8) & 0xFF) as u8;
            Some(ps)
        }
    }

    /// Eight-bit source address (logical node identifier on the network).
    pub fn source_address(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}
/// Largest PGN an identifier can carry (R, DP, PF and PS).
pub const MAX_PGN: u32 = 0x3_FFFF;

/// Whether `pgn` belongs to the addressed (PDU1) range.
#[inline]
pub fn is_pdu1_pgn(pgn: u32) -> bool {
    ((pgn >> 8) & 0xFF) < 240
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug)]
/// Fluent builder that enforces the PDU1/PDU2 rules.
pub struct CanIdBuilder {
    pub priority: u8,
    pub pgn: u32,
    pub source_address: u8,
    pub destination: Option<u8>,
}

impl CanIdBuilder {
    /// Initializes the builder for a given PGN and source address.
    pub fn new(pgn: u32, source_address: u8) -> Self {
        Self {
            priority: 6, // Default priority
            pgn,
            source_address,
            destination: None,
        }
    }

    /// Sets the priority (3 bits) to use during construction.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority & 0x07;
        self
    }

    /// Assigns a destination address (PDU1). Implies a directed message.
    pub fn to_destination(mut self, destination_address: u8) -> Self {
        self.destination = Some(destination_address);
        self
    }

    /// Builds the CAN identifier while applying J1939 rules:
    /// - PF < 240 → addressed message (PDU1): `destination` mandatory and PGN PS byte must be `0`
    /// - PF ≥ 240 → broadcast (PDU2): `destination` must not be provided
    /// - R/DP/PF/PS bits are copied from the provided PGN, which must fit in 18 bits
    ///
    /// Returns a dedicated error when the configuration violates these rules.
    pub fn build(self) -> Result<CanId, CanIdBuildError> {
        if self.pgn > MAX_PGN {
            return Err(CanIdBuildError::InvalidData);
        }
        let pf = ((self.pgn >> 8) & 0xFF) as u8;
        let ps = match self.destination {
            None if pf < 240 => return Err(CanIdBuildError::InvalidForBroadcast),
            None => (self.pgn & 0xFF) as u8,
            Some(_) if pf >= 240 => {
                return Err(CanIdBuildError::InvalidForFocusedMessage { pgn: pf })
            }
            Some(_) if self.pgn & 0xFF != 0 => {
                return Err(CanIdBuildError::PsFocusMessageMustBeNull)
            }
            Some(destination) => destination,
        };
        // R and DP travel with the PGN
        let id = ((self.priority as u32) << 26)
            | ((self.pgn & 0x3_0000) << 8)
            | ((pf as u32) << 16)
            | ((ps as u32) << 8)
            | self.source_address as u32;
        Ok(CanId(id))
    }
}
