//! High-level components of the RV-C protocol: network management, stack-owned
//! message structures, CAN/Fast Packet/multipacket transport and the frame pump.
pub mod managment;
pub mod messages;
pub mod stack;
pub mod transport;
