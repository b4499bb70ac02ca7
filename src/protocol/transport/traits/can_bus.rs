//! Asynchronous CAN bus driven by the
//! [`StackRunner`](crate::protocol::stack::runner::StackRunner). Firmware wraps its
//! controller (TWAI, FDCAN, SocketCAN...) behind it.
use crate::protocol::transport::can_frame::CanFrame;
use futures_util::Future;

/// Contract to send and receive RV-C frames asynchronously.
pub trait CanBus {
    type Error: core::fmt::Debug;
    /// Emit a frame on the bus.
    fn send<'a>(
        &'a mut self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Wait for the next frame. Must be cancel-safe: the runner drops it when its
    /// tick delay fires first.
    fn recv<'a>(
        &'a mut self,
    ) -> impl core::future::Future<Output = Result<CanFrame, Self::Error>> + 'a;
}
