//! Communication counters and the error taxonomy reported to the application.
use crate::error::{ClaimError, FastPacketError, HeapError, PersistError, PoolError};
use crate::protocol::messages::{Pgn130816, PortErrors, MAX_REPORTED_PORTS};
use crate::protocol::transport::multipacket::AbortReason;

/// Frame and transport counters, reported through PGN 130816.
///
/// Every counter saturates instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommStats {
    pub rx_frames: u32,
    pub tx_frames: u32,
    /// Heap or pool allocation refused.
    pub malloc_fail: u16,
    /// Reassemblies (multipacket or fast-packet) that ran out of time.
    pub mp_rx_timeout: u16,
    /// Unicast multipacket transmits the peer stopped answering.
    pub mp_tx_timeout: u16,
    /// CTS matching no open session.
    pub late_cts: u16,
    /// EOM matching no open session.
    pub late_eom: u16,
    /// Abort matching no open session.
    pub late_abort: u16,
    /// TP.DT matching no open session.
    pub late_xfer: u16,
    /// Driver errors, per port.
    pub port_errors: [u16; MAX_REPORTED_PORTS],
    /// Frames dropped before the stack saw them (full receive queue). Not part of the
    /// PGN 130816 report.
    pub rx_overrun: u16,
}

impl CommStats {
    pub const fn new() -> Self {
        Self {
            rx_frames: 0,
            tx_frames: 0,
            malloc_fail: 0,
            mp_rx_timeout: 0,
            mp_tx_timeout: 0,
            late_cts: 0,
            late_eom: 0,
            late_abort: 0,
            late_xfer: 0,
            port_errors: [0; MAX_REPORTED_PORTS],
            rx_overrun: 0,
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &mut u16) {
        *counter = counter.saturating_add(1);
    }

    pub(crate) fn port_error(&mut self, port: u8) {
        if let Some(counter) = self.port_errors.get_mut(port as usize) {
            Self::bump(counter);
        }
    }

    /// Statistics record covering the first `ports` ports.
    pub fn to_report(&self, ports: u8) -> Pgn130816 {
        let port_count = (ports as usize).min(MAX_REPORTED_PORTS);
        let mut report = Pgn130816 {
            rx_frames: self.rx_frames,
            tx_frames: self.tx_frames,
            malloc_fail: self.malloc_fail,
            mp_rx_timeout: self.mp_rx_timeout,
            mp_tx_timeout: self.mp_tx_timeout,
            late_cts: self.late_cts,
            late_eom: self.late_eom,
            late_abort: self.late_abort,
            late_xfer: self.late_xfer,
            port_count: port_count as u8,
            ports: [PortErrors::default(); MAX_REPORTED_PORTS],
        };
        for (port, entry) in report.ports.iter_mut().enumerate().take(port_count) {
            *entry = PortErrors {
                port: port as u8,
                port_errors: self.port_errors[port],
            };
        }
        report
    }
}

/// Layer that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorSource {
    AddressClaim,
    /// Inbound routing and dispatch.
    Inbound,
    /// Outbound drain and the send API.
    Outbound,
    Multipacket,
    FastPacket,
    NameConfig,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    Heap(HeapError),
    Pool(PoolError),
    Claim(ClaimError),
    Abort(AbortReason),
    FastPacket(FastPacketError),
    /// The driver refused a frame.
    Transmit,
    Persist(PersistError),
    /// A stack-owned PGN failed to decode.
    Malformed,
    /// Frame length not allowed for its transport.
    BadLength,
}

impl From<HeapError> for ErrorCode {
    fn from(error: HeapError) -> Self {
        Self::Heap(error)
    }
}

impl From<PoolError> for ErrorCode {
    fn from(error: PoolError) -> Self {
        Self::Pool(error)
    }
}

impl From<ClaimError> for ErrorCode {
    fn from(error: ClaimError) -> Self {
        Self::Claim(error)
    }
}

impl From<FastPacketError> for ErrorCode {
    fn from(error: FastPacketError) -> Self {
        Self::FastPacket(error)
    }
}

impl From<PersistError> for ErrorCode {
    fn from(error: PersistError) -> Self {
        Self::Persist(error)
    }
}
