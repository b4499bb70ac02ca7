//! Records of the PGNs the stack speaks itself, and the registry telling the
//! frame pump how every PGN is transported.
//!
//! Each record pairs a `'static` [`PgnDescriptor`](crate::core::PgnDescriptor) with a
//! [`FieldAccess`](crate::infra::codec::traits::FieldAccess) implementation, so the
//! codec engine packs and unpacks it. Applications describe their own PGNs the same
//! way and list them in [`StackConfig::pgn_table`](crate::protocol::stack::StackConfig).
mod config;
mod iso;
pub mod registry;
mod stats;

pub use config::{ConfigScope, Pgn126720, Pgn65240};
pub use iso::{AckReason, AckStatus, Pgn59392, Pgn59904, Pgn60928};
pub use registry::{PgnInfo, Transport};
pub use stats::{Pgn130816, PortErrors, MAX_REPORTED_PORTS};

pub const PGN_ISO_ACK: u32 = 59392;
pub const PGN_ISO_REQUEST: u32 = 59904;
pub const PGN_ADDRESS_CLAIM: u32 = 60928;
pub const PGN_COMMANDED_ADDRESS: u32 = 65240;
pub const PGN_NAME_CONFIG: u32 = 126720;
pub const PGN_COMM_STATS: u32 = 130816;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
