//! Application seams of the stack: notifications, request answers and persistent storage.
//!
//! Every method has a default, so an application only overrides what it cares about.
use crate::error::{DeserializationError, PersistError};
use crate::infra::codec::traits::PgnData;
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::managment::roster::NodeChange;
use crate::protocol::stack::stats::{ErrorCode, ErrorSource};
use crate::protocol::transport::dob::TransferOutcome;

pub use crate::protocol::messages::ConfigScope;

/// Parameters the stack keeps across power cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamType {
    /// Active NAME, 8 bytes little-endian.
    Name,
    /// Last claimed source address, 1 byte.
    Address,
    /// NAME configuration record (CAC then NAME), 9 bytes.
    NameConfig,
}

/// Non-volatile storage.
pub trait Persistence {
    /// Copy the stored bytes of `param` into `buffer` and return their length.
    fn load(
        &mut self,
        _param: ParamType,
        _scope: ConfigScope,
        _buffer: &mut [u8],
    ) -> Result<usize, PersistError> {
        Err(PersistError::NotFound)
    }

    fn save(
        &mut self,
        _param: ParamType,
        _scope: ConfigScope,
        _data: &[u8],
    ) -> Result<(), PersistError> {
        Err(PersistError::Access)
    }
}

/// Fate of a finished application transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// Release the transfer object and its payload.
    Dispose,
    /// Keep it; the hook is asked again on the next tick.
    Retain,
}

/// Answer of the application to an ISO request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestReply {
    /// The application queued the requested PGN itself.
    Handled,
    /// Known but refused; unicast requests get a Deny.
    Deny,
    /// Unknown; unicast requests get a NAK.
    Unsupported,
}

/// A complete inbound message, single frame or reassembled.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedMessage<'a> {
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
    pub priority: u8,
    pub port: u8,
    pub payload: &'a [u8],
}

impl ReceivedMessage<'_> {
    /// Decode the payload into a typed record.
    pub fn decode<P: PgnData>(&self) -> Result<P, DeserializationError> {
        P::from_payload(self.payload)
    }
}

/// Callbacks invoked from [`Stack::tick`](crate::protocol::stack::Stack::tick).
pub trait StackHooks: Persistence {
    /// A remote node appeared, moved, lost its address or went silent.
    fn on_node_change(&mut self, _change: NodeChange, _old: u8, _new: u8, _name: IsoName) {}

    fn on_error(&mut self, _source: ErrorSource, _code: ErrorCode) {}

    /// Application message addressed to us or broadcast.
    fn on_message(&mut self, _message: &ReceivedMessage<'_>) {}

    /// An application transfer finished with `outcome`.
    fn on_transfer_done(&mut self, _tag: Option<u32>, _outcome: TransferOutcome) -> Disposition {
        Disposition::Dispose
    }

    /// `requester` asked for `pgn` through an ISO request.
    fn on_request(&mut self, _pgn: u32, _requester: u8) -> RequestReply {
        RequestReply::Unsupported
    }

    /// Whether inbound traffic of `pgn` is wanted at all. Refused PGNs are dropped
    /// before any reassembly buffer is reserved.
    fn accepts(&mut self, _pgn: u32) -> bool {
        true
    }

    /// Whether configuration commands for `pgn` are allowed in the current mode.
    fn config_allowed(&mut self, _pgn: u32) -> bool {
        true
    }
}
