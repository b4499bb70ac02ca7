//! Bit-level codec: readers/writers, the descriptor interpreter and the traits
//! PGN structures implement to plug into it.
pub mod bits;
pub mod engine;
pub mod traits;
