//! Abstraction traits used by the transport layer: the synchronous frame driver
//! polled by the stack, and the async bus and timer driven by the runner.
pub mod can_bus;
pub mod can_driver;
pub mod korri_timer;
