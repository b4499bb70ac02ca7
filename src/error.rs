//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (CAN ID construction, heap and pool
//! exhaustion, address claiming, serialization/deserialization, etc.).
use crate::core::{FieldKind, PgnValue};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while building a 29-bit CAN identifier.
pub enum CanIdBuildError {
    /// Provided parameters do not produce a valid identifier.
    #[error("Invalid data")]
    InvalidData,
    /// Attempt to build a broadcast message (PDU2) with PF < 240.
    #[error("Invalid for broadcast message: PF is too low")]
    InvalidForBroadcast,
    /// Attempt to send an addressed message (PDU1) with PF ≥ 240.
    #[error("Invalid for addressed message: PF is too high: {pgn}")]
    InvalidForFocusedMessage { pgn: u8 },
    /// In PDU1 the lower 8 bits of the PGN must remain zero.
    #[error("PDU1 PGNs require PS = 0")]
    PsFocusMessageMustBeNull,
}

//==================================================================================HEAP_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures reported by the bounded heap.
pub enum HeapError {
    /// No free block is large enough for the request.
    #[error("Heap exhausted -> asked: {asked} bytes, free: {free} bytes")]
    OutOfMemory { asked: usize, free: usize },
    /// Zero-sized requests are refused.
    #[error("Zero-sized allocation")]
    ZeroSize,
    /// Release of a block that is already free, out of range or overlapping a free block.
    #[error("Heap corruption detected at unit {unit}")]
    Corrupted { unit: u16 },
}

//==================================================================================POOL_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures reported by the transfer-object pools.
pub enum PoolError {
    /// Every slot of the pool is in use.
    #[error("Pool full ({capacity} slots)")]
    Full { capacity: usize },
    /// The key no longer designates a live transfer object.
    #[error("Stale pool key")]
    StaleKey,
}

//==================================================================================FAST_PACKET_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reasons a Fast Packet frame cannot open a reassembly.
pub enum FastPacketError {
    /// Fast Packet frames always carry eight bytes.
    #[error("Invalid frame length: {len}")]
    InvalidLength { len: usize },
    /// The first frame of a session must carry frame index 0.
    #[error("Frame {index} received without a session")]
    NoSession { index: u8 },
    /// Declared payload length is zero or above the Fast Packet maximum.
    #[error("Invalid declared length: {declared}")]
    InvalidDeclaredLength { declared: u8 },
    /// The heap cannot hold the reassembly buffer.
    #[error(transparent)]
    Heap(#[from] HeapError),
}

//==================================================================================PERSIST_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors surfaced by [`Persistence`](crate::protocol::stack::hooks::Persistence) implementations.
pub enum PersistError {
    /// Nothing has been stored for this parameter and scope.
    #[error("Parameter not found")]
    NotFound,
    /// The storage back-end failed.
    #[error("Storage access failed")]
    Access,
    /// Stored record does not have the expected size.
    #[error("Stored record is malformed")]
    Malformed,
    /// The operation does not apply to this configuration scope.
    #[error("Unsupported configuration scope")]
    Unsupported,
}

//==================================================================================CLAIM_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised by the address-claim state machine.
pub enum ClaimError {
    /// The local NAME could not be loaded.
    #[error("NAME unavailable")]
    NameUnavailable,
    /// The reserved NAME bit is set; the NAME is refused.
    #[error("Reserved NAME bit is set")]
    ReservedBitSet,
    /// An event arrived in a state that cannot handle it.
    #[error("Unexpected event in claim state {state}")]
    BadState { state: u8 },
    /// The roster has no room for another node.
    #[error("Node roster is full")]
    NoRoom,
    /// The frame carrying a claim has an invalid length.
    #[error("Invalid claim frame")]
    InvalidFrame,
}

//==================================================================================SEND_ERROR
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors returned when queueing a PGN for transmission.
pub enum SendError {
    /// Application traffic is refused until an address is claimed.
    #[error("Address not claimed")]
    NotOnline,
    /// Payload exceeds what the selected transport can carry.
    #[error("Payload too large: {len} bytes")]
    PayloadTooLarge { len: usize },
    /// The heap cannot hold the payload copy.
    #[error(transparent)]
    Heap(#[from] HeapError),
    /// No transfer object slot is free.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// PGN serialization failed.
    #[error("Serialization failed")]
    Serialization,
    /// CAN identifier could not be built.
    #[error(transparent)]
    Build(#[from] CanIdBuildError),
}

//==================================================================================RUNNER_ERROR
#[derive(Debug, Error)]
/// Failures of the async bus behind [`StackRunner`](crate::protocol::stack::runner::StackRunner).
pub enum RunnerError<E: core::fmt::Debug> {
    #[error("CAN receive failed: {0:?}")]
    Receive(E),
    #[error("CAN send failed: {0:?}")]
    Send(E),
}

//================================================================================CODEC_ERROR

#[derive(Debug, Error)]
/// Issues encountered while serializing a PGN into a buffer.
pub enum SerializationError {
    /// Provided buffer is too small for the payload.
    #[error("Buffer too small -> asked: {asked}, available: {available}")]
    BufferTooSmall { asked: usize, available: usize },
    /// Data does not satisfy the descriptor constraints.
    #[error("Invalid data")]
    InvalidData,
    /// Field length is not an acceptable bit multiple.
    #[error("Invalid field bit length for {field_name}")]
    InvalidFieldBits { field_name: &'static str },
    /// Failed while writing bits into the output buffer.
    #[error("BitWrite error: {err}")]
    BitWriteError { err: BitWriterError },
    /// Field type not supported by the serialization engine.
    #[error("Unsupported field kind")]
    UnsupportedFieldKind,
    /// Expected field was missing from the domain structure.
    #[error("Field {field_id} not found")]
    FieldNotFound { field_id: &'static str },
    /// Generic conversion error bubbling up from the codec module.
    #[error("Codec Error: {source}")]
    CodecError { source: CodecError },
}

#[derive(Error, Debug)]
/// Errors raised while deserializing a CAN buffer into a PGN structure.
pub enum DeserializationError {
    /// Payload size does not match the expected schema.
    #[error("Invalid data length -> expected: {expected}, received: {received}")]
    InvalidDataLength { expected: usize, received: usize },
    /// The payload ends in the middle of a repeated block.
    #[error("Partial repeated block: {trailing} trailing bytes")]
    PartialRepeatBlock { trailing: usize },
    /// Bits read from the buffer cannot be interpreted according to the descriptor.
    #[error("Malformed data")]
    MalformedData,
    /// Dependent field is missing or was not populated.
    #[error("Dependency field not found {dep} for pgn {desc}")]
    DependencyFieldNotFound { dep: &'static str, desc: u32 },
    /// Field kind not supported by the parser.
    #[error("Unsupported field kind {field_kind:?}")]
    UnsupportedFieldKind { field_kind: FieldKind },
    /// Could not assign value into the target structure.
    #[error("Field assignment failed {desc}")]
    FieldAssignmentFailed { desc: &'static str },
    /// Field descriptor defines an invalid bit length.
    #[error("Invalid field bit length for {field_name}")]
    InvalidFieldBits { field_name: &'static str },
    /// Bit-level access on the buffer failed (out of bounds, misalignment…).
    #[error("BitReader error: {err}")]
    BitReaderError { err: BitReaderError },
}

#[derive(Error, Debug)]
/// Shared error abstraction for conversion helpers.
pub enum CodecError {
    /// Value type is incompatible with the algorithm.
    #[error("Data type mismatch for value {value:?}, function: {func}")]
    DataTypeMismatch { value: PgnValue, func: &'static str },
}

//==================================================================================BITREADER_ERRORS
#[derive(Debug, Error)]
/// Errors raised during bitwise buffer reads.
pub enum BitReaderError {
    /// Attempted to read past the end of the buffer.
    #[error("Attempted to read out of bounds -> asked: {asked}, available: {available}")]
    OutOfBounds { asked: usize, available: usize },
    /// Requested more bits than the target type can hold.
    #[error("Cannot read more than {max} bits. Requested: {asked}")]
    TooLongForType { max: u8, asked: u8 },
    /// Cursor is not aligned on a byte boundary when required.
    #[error("Non aligned bit. Cursor: {cursor}")]
    NonAlignedBit { cursor: usize },
}
//==================================================================================BITWRITER_ERRORS
#[derive(Debug, Error)]
/// Errors raised during bitwise writes into a buffer.
pub enum BitWriterError {
    /// Attempted to write beyond the provided capacity.
    #[error("Attempted to write out of bounds -> asked: {asked}, available: {available}")]
    OutOfBounds { asked: usize, available: usize },
    /// Field is too large for the provided type.
    #[error("Cannot write more than {max} bits. Requested: {asked}")]
    TooLongForType { max: u8, asked: u8 },
    /// Cursor is not aligned on a byte boundary when the operation requires it.
    #[error("Non aligned bit. Cursor: {cursor}")]
    NonAlignedBit { cursor: usize },
}
