//! Identity commands: commanded address (65240) and NAME configuration (126720).
use crate::core::{FieldDescriptor, FieldKind, PgnDescriptor, PgnValue};
use crate::error::{DeserializationError, SerializationError};
use crate::infra::codec::engine::{deserialize_into, serialize};
use crate::infra::codec::traits::{FieldAccess, PgnData};
use crate::protocol::managment::iso_name::IsoName;

//==================================================================================COMMANDED_ADDRESS
/// PGN 65240, ISO Commanded Address.
///
/// Nine bytes, so it always travels as a multipacket broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pgn65240 {
    /// NAME of the node being readdressed.
    pub name: IsoName,
    pub new_source_address: u8,
}

impl Pgn65240 {
    pub const PGN_65240_DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 65240,
        name: "IsoCommandedAddress",
        priority: 6,
        fastpacket: false,
        fields: &[
            FieldDescriptor::of_kind("name", "NAME", FieldKind::IsoName, 64, 0),
            FieldDescriptor::unsigned("new_source_address", "New Source Address", 8, 64),
        ],
        repeating_field_set: None,
    };

    pub const fn new() -> Self {
        Self {
            name: IsoName::NULL,
            new_source_address: 0xFE,
        }
    }
}

impl Default for Pgn65240 {
    fn default() -> Self {
        Self::new()
    }
}

impl PgnData for Pgn65240 {
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut instance = Self::new();
        deserialize_into(&mut instance, payload, &Self::PGN_65240_DESCRIPTOR)?;
        Ok(instance)
    }

    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        serialize(self, buffer, &Self::PGN_65240_DESCRIPTOR)
    }
}

impl FieldAccess for Pgn65240 {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "name" => Some(PgnValue::U64(self.name.raw())),
            "new_source_address" => Some(PgnValue::U8(self.new_source_address)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("name", PgnValue::U64(v)) => self.name = IsoName::from_raw(v),
            ("new_source_address", PgnValue::U8(v)) => self.new_source_address = v,
            _ => return None,
        }
        Some(())
    }
}

//==================================================================================NAME_CONFIGURATION
/// Configuration layer a NAME record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConfigScope {
    /// Live configuration, writable by any node.
    User = 0,
    /// Integrator defaults, writable by a diagnostic tool.
    Oem = 1,
    /// Manufacturing defaults, writable by a diagnostic tool.
    Factory = 2,
}

impl ConfigScope {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::User),
            1 => Some(Self::Oem),
            2 => Some(Self::Factory),
            _ => None,
        }
    }
}

/// PGN 126720, NAME configuration command and report.
///
/// `message_count == 0` marks a command; reports carry a non-zero count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pgn126720 {
    pub config_type: u8,
    pub message_count: u8,
    /// Concurrent access counter the command expects.
    pub cac: u8,
    pub name: IsoName,
}

impl Pgn126720 {
    pub const PGN_126720_DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 126720,
        name: "NameConfiguration",
        priority: 6,
        fastpacket: true,
        fields: &[
            FieldDescriptor::of_kind("config_type", "Configuration Type", FieldKind::Lookup, 8, 0),
            FieldDescriptor::unsigned("message_count", "Message Count", 8, 8),
            FieldDescriptor::unsigned("cac", "Concurrent Access Counter", 8, 16),
            FieldDescriptor::of_kind("name", "NAME", FieldKind::IsoName, 64, 24),
        ],
        repeating_field_set: None,
    };

    pub const fn new() -> Self {
        Self {
            config_type: ConfigScope::User as u8,
            message_count: 0,
            cac: 0,
            name: IsoName::NULL,
        }
    }

    pub fn scope(&self) -> Option<ConfigScope> {
        ConfigScope::from_u8(self.config_type)
    }

    pub fn is_command(&self) -> bool {
        self.message_count == 0
    }
}

impl Default for Pgn126720 {
    fn default() -> Self {
        Self::new()
    }
}

impl PgnData for Pgn126720 {
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut instance = Self::new();
        deserialize_into(&mut instance, payload, &Self::PGN_126720_DESCRIPTOR)?;
        Ok(instance)
    }

    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        serialize(self, buffer, &Self::PGN_126720_DESCRIPTOR)
    }
}

impl FieldAccess for Pgn126720 {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "config_type" => Some(PgnValue::U8(self.config_type)),
            "message_count" => Some(PgnValue::U8(self.message_count)),
            "cac" => Some(PgnValue::U8(self.cac)),
            "name" => Some(PgnValue::U64(self.name.raw())),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("config_type", PgnValue::U8(v)) => self.config_type = v,
            ("message_count", PgnValue::U8(v)) => self.message_count = v,
            ("cac", PgnValue::U8(v)) => self.cac = v,
            ("name", PgnValue::U64(v)) => self.name = IsoName::from_raw(v),
            _ => return None,
        }
        Some(())
    }
}
