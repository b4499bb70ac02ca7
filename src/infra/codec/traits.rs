//! Public traits exposed by the codec engine. They decouple PGN structures
//! from the serialization/deserialization logic and provide a uniform API to
//! upper layers.
use crate::core::PgnValue;
use crate::error::{DeserializationError, SerializationError};

//==================================================================================PGN_DATA
/// Implemented by every PGN struct of [`protocol::messages`](crate::protocol::messages).
/// Acts as a bridge between static descriptors and the interpretation engine.
pub trait PgnData: Sized + FieldAccess {
    /// Deserialize a payload into an instance of the struct.
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError>;

    /// Serialize the instance into the provided buffer and return the payload length.
    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError>;
}
//==================================================================================FIELD_ACCESS
/// Trait that lets the engine access PGN fields by their `'static str` identifier
/// without knowing the concrete type.
///
/// # Regular fields vs repeating fields
///
/// RV-C and NMEA 2000 PGNs may contain:
/// - **Regular fields** accessible through `field()` and `field_mut()`
/// - **Repeating field sets**, groups repeated N times and accessed through
///   `repetitive_field()` / `repetitive_field_mut()`
///
/// ## Example: PGN 130816 (communication statistics)
///
/// Contains regular counters and a repeating group with one entry per port.
///
/// ```rust, ignore
/// let mut pgn = Pgn130816::new();
///
/// // Regular field access
/// pgn.field_mut("rx_frames", PgnValue::U32(1200));
///
/// // Define the number of ports
/// pgn.set_repetitive_count("ports", 2);
///
/// // Repeating field access (port 0, then port 1)
/// pgn.repetitive_field_mut("ports", 0, "port_errors", PgnValue::U16(3));
/// pgn.repetitive_field_mut("ports", 1, "port_errors", PgnValue::U16(0));
/// ```
pub trait FieldAccess {
    /// Read the value of a regular (non-repeating) field.
    ///
    /// * `id` - Field identifier (e.g. `"rx_frames"`)
    ///
    /// Returns `Some(PgnValue)` if the field exists, `None` otherwise.
    fn field(&self, id: &'static str) -> Option<PgnValue>;

    /// Write the value of a regular (non-repeating) field.
    ///
    /// * `id` - Field identifier
    /// * `value` - Value to write; must match the expected type
    ///
    /// Returns `Some(())` on success, `None` if the field does not exist or the type mismatches.
    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()>;

    //==================== Repeating field helpers ====================

    /// Read a field inside a repeating group.
    ///
    /// * `array_id` - Repeating array identifier in snake_case (e.g. `"ports"`)
    /// * `index` - Element index (0-based)
    /// * `field_id` - Field identifier within the element (e.g. `"port_errors"`)
    ///
    /// Returns `Some(PgnValue)` if the field exists and the index is valid.
    ///
    /// Default implementation returns `None` (PGNs without repeating fields).
    fn repetitive_field(
        &self,
        _array_id: &'static str,
        _index: usize,
        _field_id: &'static str,
    ) -> Option<PgnValue> {
        None
    }

    /// Write a field in a repeating group.
    ///
    /// * `array_id` - Repeating array identifier in snake_case
    /// * `index` - Element index (0-based)
    /// * `field_id` - Field identifier within the element
    /// * `value` - Value to write
    ///
    /// Returns `Some(())` when successful, `None` if the field or index is invalid or the type mismatches.
    ///
    /// Invariant: `index` must be strictly less than `repetitive_count()`.
    ///
    /// Default implementation returns `None` (PGNs without repeating fields).
    fn repetitive_field_mut(
        &mut self,
        _array_id: &'static str,
        _index: usize,
        _field_id: &'static str,
        _value: PgnValue,
    ) -> Option<()> {
        None
    }

    /// Get the number of valid elements in a repeating array.
    ///
    /// * `array_id` - Repeating array identifier in snake_case
    ///
    /// Returns `Some(count)` (possibly 0) or `None` if the array does not exist.
    ///
    /// Invariant: the value must always be ≤ `max_repetitions` defined by the descriptor.
    ///
    /// Default implementation returns `None` (PGNs without repeating fields).
    fn repetitive_count(&self, _array_id: &'static str) -> Option<usize> {
        None
    }

    /// Set the number of valid entries in a repeating array.
    ///
    /// * `array_id` - Repeating array identifier in snake_case
    /// * `count` - Number of valid elements (must be ≤ `max_repetitions`)
    ///
    /// Returns `Some(())` on success, `None` if the array does not exist or the count is invalid.
    ///
    /// Safety: implementers must ensure `count` never exceeds `max_repetitions`.
    ///
    /// Default implementation returns `None` (PGNs without repeating fields).
    fn set_repetitive_count(&mut self, _array_id: &'static str, _count: usize) -> Option<()> {
        None
    }
}
