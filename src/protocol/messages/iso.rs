//! ISO 11783-5 network management records: acknowledgment, request and
//! address claim.
use crate::core::{FieldDescriptor, FieldKind, PgnDescriptor, PgnValue};
use crate::error::{DeserializationError, SerializationError};
use crate::infra::codec::engine::{deserialize_into, serialize};
use crate::infra::codec::traits::{FieldAccess, PgnData};

//==================================================================================ACK
/// Control byte of an ISO acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AckStatus {
    Ack = 0,
    Nak = 1,
    Deny = 2,
    CannotRespond = 3,
}

impl From<u8> for AckStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ack,
            1 => Self::Nak,
            2 => Self::Deny,
            _ => Self::CannotRespond,
        }
    }
}

/// Group function value qualifying a NAK or a Deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AckReason {
    /// The PGN is not handled by this node.
    Unsupported = 1,
    /// The PGN is known but no data can be produced.
    NotAvailable = 2,
    /// The message is not allowed on this path (e.g. broadcast command).
    Protocol = 3,
    /// The sender is not allowed to issue this command.
    Security = 4,
    /// The application refuses the command in its current mode.
    WrongMode = 5,
    /// Persistent storage could not be read or written.
    DataAccess = 6,
    /// Concurrent access counter mismatch.
    Cac = 7,
    /// A field carries an out-of-range value.
    DataInvalid = 8,
    /// The frame length does not match the PGN.
    DlcInvalid = 9,
    DoNotCare = 0xFF,
}

impl From<u8> for AckReason {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Unsupported,
            2 => Self::NotAvailable,
            3 => Self::Protocol,
            4 => Self::Security,
            5 => Self::WrongMode,
            6 => Self::DataAccess,
            7 => Self::Cac,
            8 => Self::DataInvalid,
            9 => Self::DlcInvalid,
            _ => Self::DoNotCare,
        }
    }
}

/// PGN 59392, ISO Acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pgn59392 {
    pub control: u8,
    pub group_function: u8,
    /// PGN being acknowledged.
    pub pgn: u32,
}

impl Pgn59392 {
    pub const PGN_59392_DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 59392,
        name: "IsoAcknowledgement",
        priority: 6,
        fastpacket: false,
        fields: &[
            FieldDescriptor::of_kind("control", "Control", FieldKind::Lookup, 8, 0),
            FieldDescriptor::of_kind(
                "group_function",
                "Group Function",
                FieldKind::Lookup,
                8,
                8,
            ),
            FieldDescriptor::of_kind("reserved_16", "Reserved", FieldKind::Reserved, 24, 16),
            FieldDescriptor::of_kind("pgn", "PGN", FieldKind::Pgn, 24, 40),
        ],
        repeating_field_set: None,
    };

    /// Create a new instance with protocol-compliant defaults.
    pub const fn new() -> Self {
        Self {
            control: AckStatus::Ack as u8,
            group_function: AckReason::DoNotCare as u8,
            pgn: 0,
        }
    }

    /// Acknowledgment of `pgn` with the given status and reason.
    pub const fn reply(pgn: u32, status: AckStatus, reason: AckReason) -> Self {
        Self {
            control: status as u8,
            group_function: reason as u8,
            pgn,
        }
    }

    pub fn status(&self) -> AckStatus {
        AckStatus::from(self.control)
    }

    pub fn reason(&self) -> AckReason {
        AckReason::from(self.group_function)
    }
}

impl Default for Pgn59392 {
    fn default() -> Self {
        Self::new()
    }
}

impl PgnData for Pgn59392 {
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut instance = Self::new();
        deserialize_into(&mut instance, payload, &Self::PGN_59392_DESCRIPTOR)?;
        Ok(instance)
    }

    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        serialize(self, buffer, &Self::PGN_59392_DESCRIPTOR)
    }
}

impl FieldAccess for Pgn59392 {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "control" => Some(PgnValue::U8(self.control)),
            "group_function" => Some(PgnValue::U8(self.group_function)),
            "pgn" => Some(PgnValue::U32(self.pgn)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("control", PgnValue::U8(v)) => self.control = v,
            ("group_function", PgnValue::U8(v)) => self.group_function = v,
            ("pgn", PgnValue::U32(v)) => self.pgn = v,
            _ => return None,
        }
        Some(())
    }
}

//==================================================================================REQUEST
/// PGN 59904, ISO Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pgn59904 {
    /// PGN the requester wants transmitted.
    pub pgn: u32,
}

impl Pgn59904 {
    pub const PGN_59904_DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 59904,
        name: "IsoRequest",
        priority: 6,
        fastpacket: false,
        fields: &[FieldDescriptor::of_kind("pgn", "PGN", FieldKind::Pgn, 24, 0)],
        repeating_field_set: None,
    };

    pub const fn new() -> Self {
        Self { pgn: 0 }
    }

    pub const fn for_pgn(pgn: u32) -> Self {
        Self { pgn }
    }
}

impl PgnData for Pgn59904 {
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut instance = Self::new();
        deserialize_into(&mut instance, payload, &Self::PGN_59904_DESCRIPTOR)?;
        Ok(instance)
    }

    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        serialize(self, buffer, &Self::PGN_59904_DESCRIPTOR)
    }
}

impl FieldAccess for Pgn59904 {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "pgn" => Some(PgnValue::U32(self.pgn)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("pgn", PgnValue::U32(v)) => self.pgn = v,
            _ => return None,
        }
        Some(())
    }
}

//==================================================================================ADDRESS_CLAIM
/// PGN 60928, ISO Address Claim: the claimer's NAME split into its fields.
///
/// See [`IsoName`](crate::protocol::managment::iso_name::IsoName) for the packed form
/// used by the claim state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pgn60928 {
    pub unique_number: u32,
    pub manufacturer_code: u16,
    pub device_instance_lower: u8,
    pub device_instance_upper: u8,
    pub device_function: u8,
    pub device_class: u8,
    pub system_instance: u8,
    pub industry_group: u8,
    pub self_configurable: u8,
}

impl Pgn60928 {
    pub const PGN_60928_DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 60928,
        name: "IsoAddressClaim",
        priority: 6,
        fastpacket: false,
        fields: &NAME_FIELDS,
        repeating_field_set: None,
    };

    pub const fn new() -> Self {
        Self {
            unique_number: 0,
            manufacturer_code: 0,
            device_instance_lower: 0,
            device_instance_upper: 0,
            device_function: 0,
            device_class: 0,
            system_instance: 0,
            industry_group: 0,
            self_configurable: 0,
        }
    }
}

/// Field layout of a NAME.
const NAME_FIELDS: [FieldDescriptor; 10] = [
    FieldDescriptor::unsigned("unique_number", "Unique Number", 21, 0),
    FieldDescriptor::unsigned("manufacturer_code", "Manufacturer Code", 11, 21),
    FieldDescriptor::unsigned("device_instance_lower", "Device Instance Lower", 3, 32),
    FieldDescriptor::unsigned("device_instance_upper", "Device Instance Upper", 5, 35),
    FieldDescriptor::of_kind(
        "device_function",
        "Device Function",
        FieldKind::Lookup,
        8,
        40,
    ),
    FieldDescriptor::of_kind("reserved_48", "Reserved", FieldKind::Spare, 1, 48),
    FieldDescriptor::of_kind("device_class", "Device Class", FieldKind::Lookup, 7, 49),
    FieldDescriptor::unsigned("system_instance", "System Instance", 4, 56),
    FieldDescriptor::of_kind(
        "industry_group",
        "Industry Group",
        FieldKind::Lookup,
        3,
        60,
    ),
    FieldDescriptor::unsigned("self_configurable", "Self Configurable Address", 1, 63),
];

impl PgnData for Pgn60928 {
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut instance = Self::new();
        deserialize_into(&mut instance, payload, &Self::PGN_60928_DESCRIPTOR)?;
        Ok(instance)
    }

    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        serialize(self, buffer, &Self::PGN_60928_DESCRIPTOR)
    }
}

impl FieldAccess for Pgn60928 {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "unique_number" => Some(PgnValue::U32(self.unique_number)),
            "manufacturer_code" => Some(PgnValue::U16(self.manufacturer_code)),
            "device_instance_lower" => Some(PgnValue::U8(self.device_instance_lower)),
            "device_instance_upper" => Some(PgnValue::U8(self.device_instance_upper)),
            "device_function" => Some(PgnValue::U8(self.device_function)),
            "device_class" => Some(PgnValue::U8(self.device_class)),
            "system_instance" => Some(PgnValue::U8(self.system_instance)),
            "industry_group" => Some(PgnValue::U8(self.industry_group)),
            "self_configurable" => Some(PgnValue::U8(self.self_configurable)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("unique_number", PgnValue::U32(v)) => self.unique_number = v,
            ("manufacturer_code", PgnValue::U16(v)) => self.manufacturer_code = v,
            ("device_instance_lower", PgnValue::U8(v)) => self.device_instance_lower = v,
            ("device_instance_upper", PgnValue::U8(v)) => self.device_instance_upper = v,
            ("device_function", PgnValue::U8(v)) => self.device_function = v,
            ("device_class", PgnValue::U8(v)) => self.device_class = v,
            ("system_instance", PgnValue::U8(v)) => self.system_instance = v,
            ("industry_group", PgnValue::U8(v)) => self.industry_group = v,
            ("self_configurable", PgnValue::U8(v)) => self.self_configurable = v,
            _ => return None,
        }
        Some(())
    }
}
