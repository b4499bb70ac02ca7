//! End-to-end tests for the generic PGN serialization/deserialization engine.
use crate::core::{
    FieldDescriptor, FieldKind, PgnBytes, PgnDescriptor, PgnValue, RepeatingFieldSet,
};
use crate::error::{DeserializationError, SerializationError};
use crate::infra::codec::{
    engine::{deserialize_into, serialize, validate_length},
    traits::FieldAccess,
};

//==================================================================================FIXTURES

/// Status-like record mixing a scaled temperature, a lookup, reserved bits and a
/// nibble counter.
#[derive(Debug, Default, PartialEq)]
struct ThermalStatus {
    instance: u8,
    mode: u8,
    counter: u8,
    temperature: f32,
    load: u16,
}

impl ThermalStatus {
    const DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 0x1FFB7,
        name: "Thermal status",
        priority: 6,
        fastpacket: false,
        fields: &[
            FieldDescriptor::unsigned("instance", "Instance", 8, 0),
            FieldDescriptor::of_kind("mode", "Mode", FieldKind::Lookup, 4, 8),
            FieldDescriptor::of_kind("reserved_12", "Reserved", FieldKind::Reserved, 4, 12),
            FieldDescriptor::unsigned("counter", "Counter", 8, 16),
            FieldDescriptor::scaled("temperature", "Temperature", 16, 24, true, 0.03125),
            FieldDescriptor::unsigned("load", "Load", 16, 40),
        ],
        repeating_field_set: None,
    };
}

impl FieldAccess for ThermalStatus {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "instance" => Some(PgnValue::U8(self.instance)),
            "mode" => Some(PgnValue::U8(self.mode)),
            "counter" => Some(PgnValue::U8(self.counter)),
            "temperature" => Some(PgnValue::F32(self.temperature)),
            "load" => Some(PgnValue::U16(self.load)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("instance", PgnValue::U8(v)) => self.instance = v,
            ("mode", PgnValue::U8(v)) => self.mode = v,
            ("counter", PgnValue::U8(v)) => self.counter = v,
            ("temperature", PgnValue::F32(v)) => self.temperature = v,
            ("load", PgnValue::U16(v)) => self.load = v,
            _ => return None,
        }
        Some(())
    }
}

/// Port counters of a bridge: a count followed by `(port, frames)` blocks.
#[derive(Debug, Default, PartialEq)]
struct PortCounters {
    count: u8,
    ports: [(u8, u16); 4],
}

const PORT_BLOCK: RepeatingFieldSet = RepeatingFieldSet {
    array_id: "ports",
    count_field_index: 0,
    start_field_index: 1,
    size: 2,
    max_repetitions: 4,
};

impl PortCounters {
    const DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 0x1FF00,
        name: "Port counters",
        priority: 7,
        fastpacket: true,
        fields: &[
            FieldDescriptor::unsigned("count", "Count", 8, 0),
            FieldDescriptor::unsigned("port", "Port", 8, 8),
            FieldDescriptor::unsigned("frames", "Frames", 16, 16),
        ],
        repeating_field_set: Some(&PORT_BLOCK),
    };
}

impl FieldAccess for PortCounters {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "count" => Some(PgnValue::U8(self.count)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("count", PgnValue::U8(v)) => self.count = v,
            _ => return None,
        }
        Some(())
    }

    fn repetitive_field(
        &self,
        array_id: &'static str,
        index: usize,
        field_id: &'static str,
    ) -> Option<PgnValue> {
        if array_id != "ports" || index >= self.count as usize {
            return None;
        }
        let (port, frames) = self.ports.get(index)?;
        match field_id {
            "port" => Some(PgnValue::U8(*port)),
            "frames" => Some(PgnValue::U16(*frames)),
            _ => None,
        }
    }

    fn repetitive_field_mut(
        &mut self,
        array_id: &'static str,
        index: usize,
        field_id: &'static str,
        value: PgnValue,
    ) -> Option<()> {
        if array_id != "ports" || index >= self.count as usize {
            return None;
        }
        let entry = self.ports.get_mut(index)?;
        match (field_id, value) {
            ("port", PgnValue::U8(v)) => entry.0 = v,
            ("frames", PgnValue::U16(v)) => entry.1 = v,
            _ => return None,
        }
        Some(())
    }

    fn repetitive_count(&self, array_id: &'static str) -> Option<usize> {
        (array_id == "ports").then_some(self.count as usize)
    }

    fn set_repetitive_count(&mut self, array_id: &'static str, count: usize) -> Option<()> {
        if array_id != "ports" || count > self.ports.len() {
            return None;
        }
        self.count = count as u8;
        Some(())
    }
}

/// Floats in host layout plus a fixed 6-byte label.
#[derive(Debug, PartialEq)]
struct Labelled {
    gain: f32,
    offset: f64,
    label: PgnBytes,
}

impl Labelled {
    const DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 0x1FF01,
        name: "Labelled",
        priority: 7,
        fastpacket: true,
        fields: &[
            FieldDescriptor::of_kind("gain", "Gain", FieldKind::Float, 32, 0),
            FieldDescriptor::of_kind("offset", "Offset", FieldKind::Float, 64, 32),
            FieldDescriptor::of_kind("label", "Label", FieldKind::StringFix, 48, 96),
        ],
        repeating_field_set: None,
    };

    fn empty() -> Self {
        Self {
            gain: 0.0,
            offset: 0.0,
            label: PgnBytes::new(),
        }
    }
}

impl FieldAccess for Labelled {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "gain" => Some(PgnValue::F32(self.gain)),
            "offset" => Some(PgnValue::F64(self.offset)),
            "label" => Some(PgnValue::Bytes(self.label)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("gain", PgnValue::F32(v)) => self.gain = v,
            ("offset", PgnValue::F64(v)) => self.offset = v,
            ("label", PgnValue::Bytes(v)) => self.label = v,
            _ => return None,
        }
        Some(())
    }
}

//==================================================================================SINGLE_FRAME

#[test]
/// A 7-byte record packs LSB first, leaves reserved bits set and pads to 8 bytes.
fn test_single_frame_layout_and_padding() {
    let status = ThermalStatus {
        instance: 3,
        mode: 0x5,
        counter: 0x42,
        temperature: -10.0,
        load: 0x1234,
    };
    let mut buffer = [0u8; 8];
    let len = serialize(&status, &mut buffer, &ThermalStatus::DESCRIPTOR).unwrap();
    assert_eq!(len, 8);

    // -10 / 0.03125 = -320 = 0xFEC0
    assert_eq!(buffer, [0x03, 0xF5, 0x42, 0xC0, 0xFE, 0x34, 0x12, 0xFF]);

    let mut decoded = ThermalStatus::default();
    deserialize_into(&mut decoded, &buffer, &ThermalStatus::DESCRIPTOR).unwrap();
    assert_eq!(decoded, status);
}

#[test]
/// Scaled values are rounded half away from zero.
fn test_scaled_value_rounding() {
    let status = ThermalStatus {
        temperature: 0.046875, // 1.5 units
        ..Default::default()
    };
    let mut buffer = [0u8; 8];
    serialize(&status, &mut buffer, &ThermalStatus::DESCRIPTOR).unwrap();
    assert_eq!(&buffer[3..5], &[0x02, 0x00]);

    let negative = ThermalStatus {
        temperature: -0.046875,
        ..Default::default()
    };
    serialize(&negative, &mut buffer, &ThermalStatus::DESCRIPTOR).unwrap();
    assert_eq!(&buffer[3..5], &(-2i16).to_le_bytes());
}

#[test]
/// Length checks of fixed schemas: the exact length and a full frame are accepted.
fn test_fixed_schema_length_rules() {
    let descriptor = &ThermalStatus::DESCRIPTOR;
    assert!(validate_length(descriptor, 7).is_ok());
    assert!(validate_length(descriptor, 8).is_ok());
    assert!(matches!(
        validate_length(descriptor, 6),
        Err(DeserializationError::InvalidDataLength {
            expected: 7,
            received: 6
        })
    ));
    assert!(matches!(
        validate_length(descriptor, 9),
        Err(DeserializationError::InvalidDataLength { .. })
    ));
}

#[test]
/// A buffer shorter than the fixed region is refused before anything is written.
fn test_serialize_buffer_too_small() {
    let mut buffer = [0xAAu8; 4];
    let result = serialize(&ThermalStatus::default(), &mut buffer, &ThermalStatus::DESCRIPTOR);
    assert!(matches!(
        result,
        Err(SerializationError::BufferTooSmall {
            asked: 7,
            available: 4
        })
    ));
    assert_eq!(buffer, [0xAA; 4]);
}

//==================================================================================REPEATING_BLOCKS

#[test]
/// Repeated blocks round-trip and the counter drives the decoded length.
fn test_repeating_blocks_round_trip() {
    let mut counters = PortCounters::default();
    counters.count = 2;
    counters.ports[0] = (1, 1000);
    counters.ports[1] = (2, 0xBEEF);

    let mut buffer = [0u8; 32];
    let len = serialize(&counters, &mut buffer, &PortCounters::DESCRIPTOR).unwrap();
    // 1 + 2 * 3 = 7, padded to a frame
    assert_eq!(len, 8);
    assert_eq!(&buffer[..8], &[2, 1, 0xE8, 0x03, 2, 0xEF, 0xBE, 0xFF]);

    let mut decoded = PortCounters::default();
    deserialize_into(&mut decoded, &buffer[..len], &PortCounters::DESCRIPTOR).unwrap();
    assert_eq!(decoded, counters);
}

#[test]
/// A multi-frame payload ending in the middle of a block is rejected.
fn test_partial_trailing_block() {
    let payload = [3u8, 1, 0, 0, 2, 0, 0, 3, 0, 0, 0xFF];
    let mut decoded = PortCounters::default();
    let result = deserialize_into(&mut decoded, &payload, &PortCounters::DESCRIPTOR);
    assert!(matches!(
        result,
        Err(DeserializationError::PartialRepeatBlock { trailing: 1 })
    ));
}

#[test]
/// A counter announcing more blocks than present (or allowed) is rejected.
fn test_counter_exceeding_payload() {
    let mut decoded = PortCounters::default();
    let short = [3u8, 1, 0, 0, 2, 0, 0, 0xFF];
    assert!(matches!(
        deserialize_into(&mut decoded, &short, &PortCounters::DESCRIPTOR),
        Err(DeserializationError::InvalidDataLength {
            expected: 10,
            received: 8
        })
    ));

    let too_many = [5u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    assert!(matches!(
        deserialize_into(&mut decoded, &too_many, &PortCounters::DESCRIPTOR),
        Err(DeserializationError::InvalidDataLength { .. })
    ));
}

#[test]
/// Serializing more blocks than the descriptor allows fails.
fn test_serialize_too_many_blocks() {
    struct Liar;
    impl FieldAccess for Liar {
        fn field(&self, id: &'static str) -> Option<PgnValue> {
            (id == "count").then_some(PgnValue::U8(9))
        }
        fn field_mut(&mut self, _id: &'static str, _value: PgnValue) -> Option<()> {
            None
        }
        fn repetitive_count(&self, _array_id: &'static str) -> Option<usize> {
            Some(9)
        }
    }
    let mut buffer = [0u8; 64];
    assert!(matches!(
        serialize(&Liar, &mut buffer, &PortCounters::DESCRIPTOR),
        Err(SerializationError::InvalidData)
    ));
}

//==================================================================================FLOATS_AND_BLOBS

#[test]
/// Floats travel in host layout and short strings keep the 0xFF padding.
fn test_float_and_string_fields() {
    let record = Labelled {
        gain: 1.5,
        offset: -2.25,
        label: PgnBytes::from_slice(b"RV"),
    };
    let mut buffer = [0u8; 18];
    let len = serialize(&record, &mut buffer, &Labelled::DESCRIPTOR).unwrap();
    assert_eq!(len, 18);
    assert_eq!(&buffer[..4], &1.5f32.to_ne_bytes());
    assert_eq!(&buffer[4..12], &(-2.25f64).to_ne_bytes());
    assert_eq!(&buffer[12..], b"RV\xFF\xFF\xFF\xFF");

    let mut decoded = Labelled::empty();
    deserialize_into(&mut decoded, &buffer, &Labelled::DESCRIPTOR).unwrap();
    assert_eq!(decoded.gain, 1.5);
    assert_eq!(decoded.offset, -2.25);
    assert_eq!(decoded.label.as_slice(), b"RV\xFF\xFF\xFF\xFF");
}

#[test]
/// A string longer than its field is refused.
fn test_string_too_long() {
    let record = Labelled {
        gain: 0.0,
        offset: 0.0,
        label: PgnBytes::from_slice(b"TOO LONG"),
    };
    let mut buffer = [0u8; 18];
    assert!(matches!(
        serialize(&record, &mut buffer, &Labelled::DESCRIPTOR),
        Err(SerializationError::InvalidData)
    ));
}

#[test]
/// A value of the wrong type is reported as a codec mismatch.
fn test_type_mismatch() {
    struct Wrong;
    impl FieldAccess for Wrong {
        fn field(&self, id: &'static str) -> Option<PgnValue> {
            match id {
                "gain" => Some(PgnValue::U8(1)),
                _ => Some(PgnValue::F64(0.0)),
            }
        }
        fn field_mut(&mut self, _id: &'static str, _value: PgnValue) -> Option<()> {
            None
        }
    }
    let mut buffer = [0u8; 18];
    assert!(matches!(
        serialize(&Wrong, &mut buffer, &Labelled::DESCRIPTOR),
        Err(SerializationError::CodecError { .. })
    ));
}

#[test]
/// Missing fields in the record surface the field identifier.
fn test_missing_field() {
    struct Empty;
    impl FieldAccess for Empty {
        fn field(&self, _id: &'static str) -> Option<PgnValue> {
            None
        }
        fn field_mut(&mut self, _id: &'static str, _value: PgnValue) -> Option<()> {
            None
        }
    }
    let mut buffer = [0u8; 8];
    assert!(matches!(
        serialize(&Empty, &mut buffer, &ThermalStatus::DESCRIPTOR),
        Err(SerializationError::FieldNotFound {
            field_id: "instance"
        })
    ));
}
