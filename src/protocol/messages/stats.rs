//! Communication statistics report (130816).
use crate::core::{FieldDescriptor, FieldKind, PgnDescriptor, PgnValue, RepeatingFieldSet};
use crate::error::{DeserializationError, SerializationError};
use crate::infra::codec::engine::{deserialize_into, serialize};
use crate::infra::codec::traits::{FieldAccess, PgnData};

/// Ports a single report can describe.
pub const MAX_REPORTED_PORTS: usize = 4;

/// Error counter of one CAN port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortErrors {
    pub port: u8,
    pub port_errors: u16,
}

const PORTS: RepeatingFieldSet = RepeatingFieldSet {
    array_id: "ports",
    count_field_index: 9,
    start_field_index: 10,
    size: 2,
    max_repetitions: MAX_REPORTED_PORTS,
};

/// PGN 130816, communication statistics of the transport stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pgn130816 {
    pub rx_frames: u32,
    pub tx_frames: u32,
    pub malloc_fail: u16,
    pub mp_rx_timeout: u16,
    pub mp_tx_timeout: u16,
    pub late_cts: u16,
    pub late_eom: u16,
    pub late_abort: u16,
    pub late_xfer: u16,
    pub port_count: u8,
    pub ports: [PortErrors; MAX_REPORTED_PORTS],
}

impl Pgn130816 {
    pub const PGN_130816_DESCRIPTOR: PgnDescriptor = PgnDescriptor {
        id: 130816,
        name: "CommunicationStatistics",
        priority: 7,
        fastpacket: true,
        fields: &[
            FieldDescriptor::unsigned("rx_frames", "Frames Received", 32, 0),
            FieldDescriptor::unsigned("tx_frames", "Frames Sent", 32, 32),
            FieldDescriptor::unsigned("malloc_fail", "Allocation Failures", 16, 64),
            FieldDescriptor::unsigned("mp_rx_timeout", "Multipacket Receive Timeouts", 16, 80),
            FieldDescriptor::unsigned("mp_tx_timeout", "Multipacket Send Timeouts", 16, 96),
            FieldDescriptor::unsigned("late_cts", "Late CTS", 16, 112),
            FieldDescriptor::unsigned("late_eom", "Late EOM", 16, 128),
            FieldDescriptor::unsigned("late_abort", "Late Abort", 16, 144),
            FieldDescriptor::unsigned("late_xfer", "Late Data", 16, 160),
            FieldDescriptor::unsigned("port_count", "Port Count", 8, 176),
            FieldDescriptor::of_kind("port", "Port", FieldKind::Lookup, 8, 184),
            FieldDescriptor::unsigned("port_errors", "Port Errors", 16, 192),
        ],
        repeating_field_set: Some(&PORTS),
    };

    /// Create a new instance with protocol-compliant defaults.
    pub fn new() -> Self {
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
            port_count: 0,
            ports: Default::default(),
        }
    }
}

impl Default for Pgn130816 {
    fn default() -> Self {
        Self::new()
    }
}

impl PgnData for Pgn130816 {
    fn from_payload(payload: &[u8]) -> Result<Self, DeserializationError> {
        let mut instance = Self::new();
        deserialize_into(&mut instance, payload, &Self::PGN_130816_DESCRIPTOR)?;
        Ok(instance)
    }

    fn to_payload(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        serialize(self, buffer, &Self::PGN_130816_DESCRIPTOR)
    }
}

impl FieldAccess for Pgn130816 {
    fn field(&self, id: &'static str) -> Option<PgnValue> {
        match id {
            "rx_frames" => Some(PgnValue::U32(self.rx_frames)),
            "tx_frames" => Some(PgnValue::U32(self.tx_frames)),
            "malloc_fail" => Some(PgnValue::U16(self.malloc_fail)),
            "mp_rx_timeout" => Some(PgnValue::U16(self.mp_rx_timeout)),
            "mp_tx_timeout" => Some(PgnValue::U16(self.mp_tx_timeout)),
            "late_cts" => Some(PgnValue::U16(self.late_cts)),
            "late_eom" => Some(PgnValue::U16(self.late_eom)),
            "late_abort" => Some(PgnValue::U16(self.late_abort)),
            "late_xfer" => Some(PgnValue::U16(self.late_xfer)),
            "port_count" => Some(PgnValue::U8(self.port_count)),
            _ => None,
        }
    }

    fn field_mut(&mut self, id: &'static str, value: PgnValue) -> Option<()> {
        match (id, value) {
            ("rx_frames", PgnValue::U32(v)) => self.rx_frames = v,
            ("tx_frames", PgnValue::U32(v)) => self.tx_frames = v,
            ("malloc_fail", PgnValue::U16(v)) => self.malloc_fail = v,
            ("mp_rx_timeout", PgnValue::U16(v)) => self.mp_rx_timeout = v,
            ("mp_tx_timeout", PgnValue::U16(v)) => self.mp_tx_timeout = v,
            ("late_cts", PgnValue::U16(v)) => self.late_cts = v,
            ("late_eom", PgnValue::U16(v)) => self.late_eom = v,
            ("late_abort", PgnValue::U16(v)) => self.late_abort = v,
            ("late_xfer", PgnValue::U16(v)) => self.late_xfer = v,
            ("port_count", PgnValue::U8(v)) => self.port_count = v,
            _ => return None,
        }
        Some(())
    }

    fn repetitive_field(
        &self,
        array_id: &'static str,
        index: usize,
        field_id: &'static str,
    ) -> Option<PgnValue> {
        if array_id != "ports" || index >= self.port_count as usize {
            return None;
        }
        let entry = self.ports.get(index)?;
        match field_id {
            "port" => Some(PgnValue::U8(entry.port)),
            "port_errors" => Some(PgnValue::U16(entry.port_errors)),
            _ => None,
        }
    }

    fn repetitive_field_mut(
        &mut self,
        array_id: &'static str,
        index: usize,
        field_id: &'static str,
        value: PgnValue,
    ) -> Option<()> {
        if array_id != "ports" || index >= self.port_count as usize {
            return None;
        }
        let entry = self.ports.get_mut(index)?;
        match (field_id, value) {
            ("port", PgnValue::U8(v)) => entry.port = v,
            ("port_errors", PgnValue::U16(v)) => entry.port_errors = v,
            _ => return None,
        }
        Some(())
    }

    fn repetitive_count(&self, array_id: &'static str) -> Option<usize> {
        (array_id == "ports").then_some(self.port_count as usize)
    }

    fn set_repetitive_count(&mut self, array_id: &'static str, count: usize) -> Option<()> {
        if array_id != "ports" || count > MAX_REPORTED_PORTS {
            return None;
        }
        self.port_count = count as u8;
        Some(())
    }
}
