//! `korri-rvc` library: a `no_std` RV-C / J1939 node stack.
//!
//! The crate exposes the infrastructure modules (payload codec, bounded heap), the
//! protocol logic (address claiming, roster, NAME configuration), the transport
//! (single frame, Fast Packet, TP.CM/TP.DT multipacket) and the tick-driven
//! [`Stack`](protocol::stack::Stack) tying them together.
#![no_std]
/// Descriptor types shared by the message tables and the codec engine.
pub mod core;
/// Domain and low-level errors (CAN identifier construction, serialization,
/// heap, pools, claiming, persistence).
pub mod error;
/// Payload codec and fixed-capacity heap.
pub mod infra;
/// RV-C protocol implementation: transport, network management, stack-owned
/// messages and the frame pump.
pub mod protocol;
