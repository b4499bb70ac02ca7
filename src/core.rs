//! Defines the "data contract" between the hand-written PGN descriptors in
//! [`protocol::messages`](crate::protocol::messages) (or application tables) and
//! the serialization/deserialization engine (the interpreter).
//!
//! Descriptors are `'static` tables. The `engine` module consumes them to parse or
//! build binary payloads.

/// Maximum payload size handled by [`PgnBytes`]: the fast-packet ceiling (223 bytes)
/// plus a small margin.
pub const MAX_PGN_BYTES: usize = 230;

/// Payload length of a single classic CAN frame. Packed payloads are padded up to it.
pub const SINGLE_FRAME_LEN: usize = 8;

/// Semantic type of a field within a PGN.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldKind {
    /// Signed or unsigned integer; `is_signed` carries the distinction.
    Number,
    /// IEEE float (32 bits) or double (64 bits), transmitted in host byte order.
    Float,
    /// Value is an index into a dedicated enumeration.
    Lookup,
    /// Bitfield where each individual bit is a flag.
    BitLookup,
    /// Encodes a Parameter Group Number (e.g. the requested PGN of 59904).
    Pgn,
    /// Fixed-length ASCII string.
    StringFix,
    /// Raw binary block of a fixed number of bytes.
    Binary,
    /// Reserved bits to ignore at read time and left at `1` when writing.
    Reserved,
    /// Reserved block padded with zeros during writes.
    Spare,
    /// 64-bit NAME carried by PGN 60928 and 65240.
    IsoName,
}

/// Descriptor for a single PGN field.
#[derive(Debug)]
pub struct FieldDescriptor {
    /// 1. Field identifier.
    pub id: &'static str,
    /// 2. Human-readable name.
    pub name: &'static str,
    /// 3. Semantic type for the field.
    pub kind: FieldKind,
    /// 4. Field bit length.
    pub bits_length: Option<u32>,
    /// 5. Absolute bit offset for the first bit (documentation only; fields are
    ///    laid out in order).
    pub bits_offset: Option<u32>,
    /// 6. Indicates whether numbers are signed.
    pub is_signed: Option<bool>,
    /// 7. Resolution factor to apply, when relevant.
    pub resolution: Option<f32>,
}

impl FieldDescriptor {
    /// Unsigned integer field of `bits` bits.
    pub const fn unsigned(id: &'static str, name: &'static str, bits: u32, offset: u32) -> Self {
        Self {
            id,
            name,
            kind: FieldKind::Number,
            bits_length: Some(bits),
            bits_offset: Some(offset),
            is_signed: Some(false),
            resolution: None,
        }
    }

    /// Two's complement integer field of `bits` bits.
    pub const fn signed(id: &'static str, name: &'static str, bits: u32, offset: u32) -> Self {
        Self {
            id,
            name,
            kind: FieldKind::Number,
            bits_length: Some(bits),
            bits_offset: Some(offset),
            is_signed: Some(true),
            resolution: None,
        }
    }

    /// Integer field decoded as a scaled float.
    pub const fn scaled(
        id: &'static str,
        name: &'static str,
        bits: u32,
        offset: u32,
        signed: bool,
        resolution: f32,
    ) -> Self {
        Self {
            id,
            name,
            kind: FieldKind::Number,
            bits_length: Some(bits),
            bits_offset: Some(offset),
            is_signed: Some(signed),
            resolution: Some(resolution),
        }
    }

    /// Any other kind (lookups, floats, blobs, reserved bits…).
    pub const fn of_kind(
        id: &'static str,
        name: &'static str,
        kind: FieldKind,
        bits: u32,
        offset: u32,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            bits_length: Some(bits),
            bits_offset: Some(offset),
            is_signed: None,
            resolution: None,
        }
    }
}

/// Describes a repeating field set within a PGN.
///
/// Variable-length messages carry a counter followed by `count` copies of a block of
/// consecutive fields.
///
/// **Example:** the communication statistics of a bridge
/// ```text
/// Field 1 (port_count) = counter → number of ports
/// Fields 2-4 (port, frames, errors) = repeating group
/// ```
#[derive(Debug)]
pub struct RepeatingFieldSet {
    /// Identifier of the repeating array in snake_case.
    ///
    /// Used by the `FieldAccess` trait when retrieving the array with
    /// `repetitive_field()` and `repetitive_field_mut()`.
    pub array_id: &'static str,

    /// Index of the field that stores the repetition counter.
    ///
    /// This field must appear BEFORE the first repeating field.
    pub count_field_index: usize,

    /// Index of the first field in the repeating group (0-based).
    pub start_field_index: usize,

    /// Number of consecutive fields inside the repeating group.
    pub size: usize,

    /// Maximum number of allowed repetitions (array size in the record).
    pub max_repetitions: usize,
}

impl RepeatingFieldSet {
    /// Whether `field_idx` belongs to the repeated block.
    #[inline]
    pub fn contains(&self, field_idx: usize) -> bool {
        field_idx >= self.start_field_index && field_idx < self.start_field_index + self.size
    }
}

/// Descriptor for an entire PGN layout.
#[derive(Debug)]
pub struct PgnDescriptor {
    /// 1. PGN identifier.
    pub id: u32,
    /// 2. PGN name (diagnostics).
    pub name: &'static str,
    /// 3. Default message priority.
    pub priority: u8,
    /// 4. Whether the message is Fast Packet or Single Frame.
    pub fastpacket: bool,
    /// 5. Ordered list of field descriptors.
    pub fields: &'static [FieldDescriptor],
    /// 6. Optional repeated block.
    pub repeating_field_set: Option<&'static RepeatingFieldSet>,
}

impl PgnDescriptor {
    /// Bits used by every field outside the repeated block.
    pub fn fixed_bits(&self) -> usize {
        self.fields
            .iter()
            .enumerate()
            .filter(|(idx, _)| {
                !self
                    .repeating_field_set
                    .is_some_and(|rfs| rfs.contains(*idx))
            })
            .map(|(_, f)| f.bits_length.unwrap_or(0) as usize)
            .sum()
    }

    /// Length in bytes of the fixed region.
    pub fn fixed_len(&self) -> usize {
        self.fixed_bits().div_ceil(8)
    }

    /// Length in bytes of one repeated block, `0` when the PGN has none.
    pub fn block_len(&self) -> usize {
        match self.repeating_field_set {
            Some(rfs) => self.fields[rfs.start_field_index..rfs.start_field_index + rfs.size]
                .iter()
                .map(|f| f.bits_length.unwrap_or(0) as usize)
                .sum::<usize>()
                .div_ceil(8),
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgnBytes {
    pub len: usize,
    pub data: [u8; MAX_PGN_BYTES],
}

impl Default for PgnBytes {
    fn default() -> Self {
        Self {
            len: 0,
            data: [0; MAX_PGN_BYTES],
        }
    }
}

impl PgnBytes {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            len: 0,
            data: [0; MAX_PGN_BYTES],
        }
    }

    /// Build a buffer holding a copy of `slice` (clamped to `MAX_PGN_BYTES`).
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = Self::new();
        bytes.copy_from_slice(slice);
        bytes
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy bytes into the buffer and update `len`.
    #[inline]
    pub fn copy_from_slice(&mut self, slice: &[u8]) {
        let clamped = slice.len().min(MAX_PGN_BYTES);
        self.data[..clamped].copy_from_slice(&slice[..clamped]);
        self.len = clamped;
    }

    /// Immutable view over the populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PgnValue {
    U64(u64),
    U32(u32),
    U16(u16),
    U8(u8),
    I64(i64),
    I32(i32),
    I16(i16),
    I8(i8),
    F64(f64),
    F32(f32),
    Bytes(PgnBytes),
}
