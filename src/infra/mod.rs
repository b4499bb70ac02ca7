//! Infrastructure shared by the protocol layers: the bounded heap backing
//! transfer payloads and the descriptor-driven PGN codec.
pub mod codec;
pub mod heap;
