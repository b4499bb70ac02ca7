//! Generic serialization/deserialization engine driven by static PGN descriptors.
//! It controls the bit-level readers/writers and turns dynamic `PgnValue`s into
//! strongly typed domain structures.
//!
//! Wire rules:
//! - every field is written least-significant bit first, whatever the host order;
//! - unset and reserved bits keep the `0xFF` "no data" sentinel;
//! - floats travel in host-native layout (kept for compatibility with existing nodes);
//! - packed payloads are reported padded to a full 8-byte frame.
use super::bits::{BitReader, BitWriter};
use super::traits::FieldAccess;
use crate::core::{
    FieldDescriptor, FieldKind, PgnBytes, PgnDescriptor, PgnValue, MAX_PGN_BYTES,
    SINGLE_FRAME_LEN,
};
use crate::error::{CodecError, DeserializationError, SerializationError};

/// Check a received payload length against the descriptor before decoding.
///
/// * shorter than the fixed region → rejected;
/// * with a repeated block, a partial trailing block is rejected unless the whole
///   payload fits in one frame (sentinel padding of short messages);
/// * without a repeated block the length must match, except for a short schema
///   padded out to 8 bytes.
pub fn validate_length(
    descriptor: &'static PgnDescriptor,
    len: usize,
) -> Result<(), DeserializationError> {
    let fixed = descriptor.fixed_len();
    if len < fixed {
        return Err(DeserializationError::InvalidDataLength {
            expected: fixed,
            received: len,
        });
    }

    let block = descriptor.block_len();
    if block > 0 {
        let trailing = (len - fixed) % block;
        if trailing != 0 && len > SINGLE_FRAME_LEN {
            return Err(DeserializationError::PartialRepeatBlock { trailing });
        }
        return Ok(());
    }

    if len != fixed && !(len == SINGLE_FRAME_LEN && fixed < SINGLE_FRAME_LEN) {
        return Err(DeserializationError::InvalidDataLength {
            expected: fixed,
            received: len,
        });
    }
    Ok(())
}

/// Deserializes a payload into a generic PGN struct `T`.
///
/// # Parameters
/// * `instance` – object to populate field by field
/// * `payload` – raw buffer received from the CAN bus (already reassembled)
/// * `descriptor` – static descriptor that defines the PGN layout
///
/// # Return value
/// Returns `Ok(())` when every field is read and assigned correctly.
pub fn deserialize_into<T: FieldAccess>(
    instance: &mut T,
    payload: &[u8],
    descriptor: &'static PgnDescriptor,
) -> Result<(), DeserializationError> {
    validate_length(descriptor, payload.len())?;

    let mut reader = BitReader::new(payload);

    let is_repetitive_field = |field_idx: usize| -> bool {
        descriptor
            .repeating_field_set
            .is_some_and(|rfs| rfs.contains(field_idx))
    };

    for (field_idx, field_desc) in descriptor.fields.iter().enumerate() {
        // Repeated fields are handled after the fixed region
        if is_repetitive_field(field_idx) {
            continue;
        }

        if let Some(value) = read_field_value(&mut reader, field_desc)? {
            instance.field_mut(field_desc.id, value).ok_or(
                DeserializationError::FieldAssignmentFailed {
                    desc: field_desc.id,
                },
            )?
        }
    }

    // ==================== Repeating field handling ====================
    if let Some(rfs) = descriptor.repeating_field_set {
        // 1. The counter is a regular field already parsed
        let counter_field = descriptor.fields.get(rfs.count_field_index).ok_or(
            DeserializationError::DependencyFieldNotFound {
                dep: rfs.array_id,
                desc: descriptor.id,
            },
        )?;

        let count = match instance.field(counter_field.id) {
            Some(PgnValue::U8(v)) => v as usize,
            Some(PgnValue::U16(v)) => v as usize,
            Some(PgnValue::U32(v)) => v as usize,
            _ => {
                return Err(DeserializationError::DependencyFieldNotFound {
                    dep: counter_field.id,
                    desc: descriptor.id,
                })
            }
        };

        // 2. The payload must actually hold `count` blocks
        let needed = descriptor.fixed_len() + count * descriptor.block_len();
        if count > rfs.max_repetitions || needed > payload.len() {
            return Err(DeserializationError::InvalidDataLength {
                expected: needed,
                received: payload.len(),
            });
        }

        instance
            .set_repetitive_count(rfs.array_id, count)
            .ok_or(DeserializationError::FieldAssignmentFailed { desc: rfs.array_id })?;

        // 3. Iterate through every element of the repeating group
        for elem_idx in 0..count {
            for field_offset in 0..rfs.size {
                let field_idx = rfs.start_field_index + field_offset;
                let field_desc =
                    descriptor
                        .fields
                        .get(field_idx)
                        .ok_or(DeserializationError::InvalidFieldBits {
                            field_name: rfs.array_id,
                        })?;

                if let Some(value) = read_field_value(&mut reader, field_desc)? {
                    instance
                        .repetitive_field_mut(rfs.array_id, elem_idx, field_desc.id, value)
                        .ok_or(DeserializationError::FieldAssignmentFailed {
                            desc: field_desc.id,
                        })?;
                }
            }
        }
    }

    Ok(())
}

/// Serializes a PGN struct `T` into a buffer.
///
/// # Parameters
/// * `pgn_instance` – domain instance ready to convert into a raw payload
/// * `buffer` – output buffer (8 bytes for single frames, larger for multi-frame PGNs)
/// * `descriptor` – static PGN metadata
///
/// # Return value
/// Number of payload bytes, padded up to one full frame when the buffer allows it.
pub fn serialize<T: FieldAccess>(
    pgn_instance: &T,
    buffer: &mut [u8],
    descriptor: &'static PgnDescriptor,
) -> Result<usize, SerializationError> {
    let fixed = descriptor.fixed_len();
    if buffer.len() < fixed {
        return Err(SerializationError::BufferTooSmall {
            asked: fixed,
            available: buffer.len(),
        });
    }

    // Reserved bits stay at 1.
    buffer.fill(0xFF);
    let capacity = buffer.len();

    let mut writer = BitWriter::new(buffer);

    let is_repetitive_field = |field_idx: usize| -> bool {
        descriptor
            .repeating_field_set
            .is_some_and(|rfs| rfs.contains(field_idx))
    };

    for (field_idx, field_desc) in descriptor.fields.iter().enumerate() {
        if is_repetitive_field(field_idx) {
            continue;
        }

        let value = match field_desc.kind {
            // Nothing to fetch for padding
            FieldKind::Reserved | FieldKind::Spare => PgnValue::U8(0),
            _ => pgn_instance
                .field(field_desc.id)
                .ok_or(SerializationError::FieldNotFound {
                    field_id: field_desc.id,
                })?,
        };
        write_field(&mut writer, field_desc, &value)?;
    }

    // ==================== Repeating field serialization ====================
    if let Some(rfs) = descriptor.repeating_field_set {
        let count = pgn_instance.repetitive_count(rfs.array_id).ok_or(
            SerializationError::FieldNotFound {
                field_id: rfs.array_id,
            },
        )?;

        if count > rfs.max_repetitions {
            return Err(SerializationError::InvalidData);
        }

        for elem_idx in 0..count {
            for field_offset in 0..rfs.size {
                let field_idx = rfs.start_field_index + field_offset;
                let field_desc = descriptor
                    .fields
                    .get(field_idx)
                    .ok_or(SerializationError::InvalidData)?;

                let value = match field_desc.kind {
                    FieldKind::Reserved | FieldKind::Spare => PgnValue::U8(0),
                    _ => pgn_instance
                        .repetitive_field(rfs.array_id, elem_idx, field_desc.id)
                        .ok_or(SerializationError::FieldNotFound {
                            field_id: field_desc.id,
                        })?,
                };

                write_field(&mut writer, field_desc, &value)?;
            }
        }
    }

    let written = writer.bit_cursor().div_ceil(8);

    Ok(written.max(SINGLE_FRAME_LEN).min(capacity.max(written)))
}

/// Shared helper to read a single field, applying business logic (signedness,
/// resolutions, floats, blobs).
fn read_field_value(
    reader: &mut BitReader,
    field_desc: &'static FieldDescriptor,
) -> Result<Option<PgnValue>, DeserializationError> {
    let bits = field_desc
        .bits_length
        .ok_or(DeserializationError::InvalidFieldBits {
            field_name: field_desc.id,
        })?;

    match field_desc.kind {
        // Always treated as an unsigned integer without resolution.
        FieldKind::BitLookup | FieldKind::Lookup => {
            let raw_val = reader
                .read_u64(bits as u8)
                .map_err(|err| DeserializationError::BitReaderError { err })?;

            Ok(Some(unsigned_value(raw_val, bits)))
        }

        FieldKind::Number | FieldKind::Pgn => {
            let raw_val = reader
                .read_u64(bits as u8)
                .map_err(|err| DeserializationError::BitReaderError { err })?;

            let value = if field_desc.is_signed.is_some_and(|s| s) {
                let signed_val = sign_extend(raw_val, bits as u8);
                if let Some(res) = field_desc.resolution {
                    match bits {
                        1..=32 => PgnValue::F32(signed_val as f32 * res),
                        _ => PgnValue::F64(signed_val as f64 * res as f64),
                    }
                } else {
                    match bits {
                        1..=8 => PgnValue::I8(signed_val as i8),
                        9..=16 => PgnValue::I16(signed_val as i16),
                        17..=32 => PgnValue::I32(signed_val as i32),
                        _ => PgnValue::I64(signed_val),
                    }
                }
            } else if let Some(res) = field_desc.resolution {
                match bits {
                    1..=32 => PgnValue::F32(raw_val as f32 * res),
                    _ => PgnValue::F64(raw_val as f64 * res as f64),
                }
            } else {
                unsigned_value(raw_val, bits)
            };

            Ok(Some(value))
        }

        FieldKind::IsoName => {
            let raw_val = reader
                .read_u64(bits as u8)
                .map_err(|err| DeserializationError::BitReaderError { err })?;
            Ok(Some(PgnValue::U64(raw_val)))
        }

        // Host-native layout: bytes are copied as they are.
        FieldKind::Float => {
            let slice = reader
                .read_slice((bits / 8) as usize)
                .map_err(|err| DeserializationError::BitReaderError { err })?;
            match bits {
                32 => {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(slice);
                    Ok(Some(PgnValue::F32(f32::from_ne_bytes(raw))))
                }
                64 => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(slice);
                    Ok(Some(PgnValue::F64(f64::from_ne_bytes(raw))))
                }
                _ => Err(DeserializationError::InvalidFieldBits {
                    field_name: field_desc.id,
                }),
            }
        }

        FieldKind::Reserved | FieldKind::Spare => {
            reader
                .advance(bits as u8)
                .map_err(|err| DeserializationError::BitReaderError { err })?;
            Ok(None)
        }

        FieldKind::StringFix | FieldKind::Binary => {
            if bits % 8 != 0 {
                return Err(DeserializationError::InvalidFieldBits {
                    field_name: field_desc.id,
                });
            }
            let num_bytes = (bits / 8) as usize;
            if num_bytes > MAX_PGN_BYTES {
                return Err(DeserializationError::InvalidFieldBits {
                    field_name: field_desc.id,
                });
            }
            let slice = reader
                .read_slice(num_bytes)
                .map_err(|err| DeserializationError::BitReaderError { err })?;
            Ok(Some(PgnValue::Bytes(PgnBytes::from_slice(slice))))
        }
    }
}

/// Private helper that writes a single value according to its descriptor.
/// Encapsulates all business rules tied to `FieldKind`.
fn write_field(
    writer: &mut BitWriter,
    field_desc: &'static FieldDescriptor,
    value: &PgnValue,
) -> Result<(), SerializationError> {
    let bits = field_desc
        .bits_length
        .ok_or(SerializationError::InvalidFieldBits {
            field_name: field_desc.id,
        })?;

    match field_desc.kind {
        FieldKind::Number | FieldKind::Pgn => {
            let bits_to_write = if field_desc.is_signed.is_some_and(|s| s) {
                let prepared_val = if let Some(res) = field_desc.resolution {
                    // Floating-point value scaled back to an integer
                    let float_val = pgn_value_to_f64(value)
                        .map_err(|e| SerializationError::CodecError { source: e })?;
                    round_half_away(float_val / res as f64)
                } else {
                    pgn_value_to_i64(value)
                        .map_err(|e| SerializationError::CodecError { source: e })?
                };
                i64_to_u64_bitwise(prepared_val)
            } else if let Some(res) = field_desc.resolution {
                let float_val = pgn_value_to_f64(value)
                    .map_err(|e| SerializationError::CodecError { source: e })?;
                i64_to_u64_bitwise(round_half_away(float_val / res as f64))
            } else {
                pgn_value_to_u64(value).map_err(|e| SerializationError::CodecError { source: e })?
            };

            writer
                .write_u64(bits_to_write, bits as u8)
                .map_err(|err| SerializationError::BitWriteError { err })?;
        }

        FieldKind::Lookup | FieldKind::BitLookup | FieldKind::IsoName => {
            let int_val = pgn_value_to_u64(value)
                .map_err(|e| SerializationError::CodecError { source: e })?;
            writer
                .write_u64(int_val, bits as u8)
                .map_err(|err| SerializationError::BitWriteError { err })?;
        }

        FieldKind::Float => {
            match (bits, value) {
                (32, PgnValue::F32(v)) => writer.write_slice(&v.to_ne_bytes()),
                (64, PgnValue::F64(v)) => writer.write_slice(&v.to_ne_bytes()),
                (64, PgnValue::F32(v)) => writer.write_slice(&(*v as f64).to_ne_bytes()),
                _ => {
                    return Err(SerializationError::CodecError {
                        source: CodecError::DataTypeMismatch {
                            value: value.clone(),
                            func: "write_field // Float",
                        },
                    })
                }
            }
            .map_err(|err| SerializationError::BitWriteError { err })?;
        }

        FieldKind::Spare => {
            writer
                .write_u64(0, bits as u8)
                .map_err(|err| SerializationError::BitWriteError { err })?;
        }

        FieldKind::Reserved => {
            writer
                .advance(bits as u8)
                .map_err(|err| SerializationError::BitWriteError { err })?;
        }

        FieldKind::StringFix | FieldKind::Binary => {
            if let PgnValue::Bytes(val) = value {
                if bits % 8 != 0 {
                    return Err(SerializationError::InvalidFieldBits {
                        field_name: field_desc.id,
                    });
                }
                let expected_len = (bits / 8) as usize;
                if val.len > expected_len {
                    return Err(SerializationError::InvalidData);
                }
                // Short strings keep the 0xFF padding already in the buffer.
                writer
                    .write_slice(&val.data[..val.len])
                    .map_err(|err| SerializationError::BitWriteError { err })?;
                let padding = expected_len - val.len;
                for _ in 0..padding {
                    writer
                        .advance(8)
                        .map_err(|err| SerializationError::BitWriteError { err })?;
                }
            } else {
                return Err(SerializationError::CodecError {
                    source: CodecError::DataTypeMismatch {
                        value: value.clone(),
                        func: "write_field // Binary",
                    },
                });
            }
        }
    }
    Ok(())
}

/// Pick the narrowest unsigned variant able to hold `bits`.
fn unsigned_value(raw_val: u64, bits: u32) -> PgnValue {
    match bits {
        1..=8 => PgnValue::U8(raw_val as u8),
        9..=16 => PgnValue::U16(raw_val as u16),
        17..=32 => PgnValue::U32(raw_val as u32),
        _ => PgnValue::U64(raw_val),
    }
}

/// Converts a `PgnValue` into `f64`.
/// Normalizes values to double precision when a resolution must be applied during serialization.
fn pgn_value_to_f64(value: &PgnValue) -> Result<f64, CodecError> {
    match value {
        PgnValue::F64(v) => Ok(*v),
        PgnValue::F32(v) => Ok(*v as f64),
        PgnValue::I64(v) => Ok(*v as f64),
        PgnValue::I32(v) => Ok(*v as f64),
        PgnValue::I16(v) => Ok(*v as f64),
        PgnValue::I8(v) => Ok(*v as f64),
        _ => Err(CodecError::DataTypeMismatch {
            value: value.clone(),
            func: "pgn_value_to_f64",
        }),
    }
}

/// Converts a `PgnValue` into `i64`.
/// Used to serialize signed fields while handling implicit widening from smaller integer sizes.
fn pgn_value_to_i64(value: &PgnValue) -> Result<i64, CodecError> {
    match value {
        PgnValue::I64(v) => Ok(*v),
        PgnValue::I32(v) => Ok(*v as i64),
        PgnValue::I16(v) => Ok(*v as i64),
        PgnValue::I8(v) => Ok(*v as i64),
        _ => Err(CodecError::DataTypeMismatch {
            value: value.clone(),
            func: "pgn_value_to_i64",
        }),
    }
}

/// Converts a `PgnValue` into `u64`.
/// Covers unsigned variants; anything else indicates a misuse of the descriptor.
fn pgn_value_to_u64(value: &PgnValue) -> Result<u64, CodecError> {
    match value {
        PgnValue::U64(v) => Ok(*v),
        PgnValue::U32(v) => Ok(*v as u64),
        PgnValue::U16(v) => Ok(*v as u64),
        PgnValue::U8(v) => Ok(*v as u64),
        _ => Err(CodecError::DataTypeMismatch {
            value: value.clone(),
            func: "pgn_value_to_u64",
        }),
    }
}

//==================================================================================

/// Round to the nearest integer, halves away from zero (`f64::round` is not in `core`).
fn round_half_away(value: f64) -> i64 {
    if value >= 0.0 {
        (value + 0.5) as i64
    } else {
        (value - 0.5) as i64
    }
}

/// Two's complement helper.
/// Extends the sign of a value read on a limited number of bits.
fn sign_extend(value: u64, bits: u8) -> i64 {
    if bits >= 64 {
        return value as i64;
    }

    let sign_bit_mask = 1u64 << (bits - 1);

    if (value & sign_bit_mask) != 0 {
        let extension_mask = u64::MAX << bits;
        (value | extension_mask) as i64
    } else {
        value as i64
    }
}

/// Reinterprets the bits of an `i64` as `u64` for writing.
#[inline]
fn i64_to_u64_bitwise(value: i64) -> u64 {
    value as u64
}

//==================================================================================TESTS

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
