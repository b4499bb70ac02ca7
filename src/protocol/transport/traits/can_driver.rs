//! Synchronous raw-frame driver used by the tick-driven stack. Hardware back-ends
//! (or the async [`StackRunner`](crate::protocol::stack::runner::StackRunner) queues)
//! implement it; the stack never blocks on it.
use crate::protocol::transport::can_frame::CanFrame;

/// Opaque token returned by the driver for every queued frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxHandle(pub u16);

/// Reasons a frame could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendStatus {
    /// No transmit slot right now; the same frame is retried on a later tick.
    Busy,
    /// The controller refused the frame.
    Error,
}

/// Raw CAN frame I/O, per port.
pub trait CanDriver {
    /// Queue `frame` for transmission on `port`.
    fn send_frame(&mut self, port: u8, frame: &CanFrame) -> Result<TxHandle, SendStatus>;

    /// Pop the next received frame of `port`, if any.
    fn receive_frame(&mut self, port: u8) -> Option<CanFrame>;

    /// Forget a handle once its transfer object is disposed.
    fn clear_handle(&mut self, _port: u8, _handle: TxHandle) {}

    /// Whether frames queued under `handle` are still waiting to leave the controller.
    fn tx_pending(&self, _port: u8, _handle: TxHandle) -> bool {
        false
    }
}
