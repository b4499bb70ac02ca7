//! Inbound routing: single frames, fast-packet reassembly, TP.CM/TP.DT sessions and
//! the PGNs the stack answers itself.
use super::{
    pick, ClaimLink, CommStats, ErrorCode, ErrorSource, ReceivedMessage, RequestReply, Route,
    Stack, StackHooks, DEFAULT_PRIORITY,
};
use crate::error::{ClaimError, FastPacketError};
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::managment::name_config::{self, CommandOrigin};
use crate::protocol::messages::registry::lookup;
use crate::protocol::messages::{
    AckReason, AckStatus, ConfigScope, Pgn126720, Pgn59904, Pgn65240, PGN_ADDRESS_CLAIM,
    PGN_COMMANDED_ADDRESS, PGN_COMM_STATS, PGN_ISO_REQUEST, PGN_NAME_CONFIG,
};
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::dob::{Dob, DobFlags, DobRole, DobState};
use crate::protocol::transport::fast_packet::assembler::{self, ProcessResult};
use crate::protocol::transport::multipacket::receiver::{self, DataOutcome, SessionKey};
use crate::protocol::transport::multipacket::sender::{self, CtsOutcome};
use crate::protocol::transport::multipacket::{AbortReason, TpCm, TP_CM_PGN, TP_DT_PGN};
use crate::protocol::transport::pool::DobKey;
use crate::protocol::transport::traits::can_driver::CanDriver;
use crate::protocol::transport::{GLOBAL_ADDRESS, NULL_ADDRESS};

/// Largest stack-owned payload (NAME configuration).
const STACK_PAYLOAD_MAX: usize = 16;

/// PGNs answered by the stack rather than the application.
fn is_stack_pgn(pgn: u32) -> bool {
    matches!(
        pgn,
        PGN_ISO_REQUEST | PGN_ADDRESS_CLAIM | PGN_COMMANDED_ADDRESS | PGN_NAME_CONFIG
    )
}

fn message_of<'a>(dob: &Dob, payload: &'a [u8]) -> ReceivedMessage<'a> {
    ReceivedMessage {
        pgn: dob.pgn,
        source: dob.source,
        destination: dob.destination,
        priority: dob.priority,
        port: dob.port,
        payload,
    }
}

impl<const HEAP: usize, const NODES: usize> Stack<HEAP, NODES> {
    pub(super) fn pump_inbound<D: CanDriver, H: StackHooks>(
        &mut self,
        port: u8,
        driver: &mut D,
        hooks: &mut H,
    ) {
        for _ in 0..self.config.max_rx_frames_per_tick {
            let Some(frame) = driver.receive_frame(port) else {
                break;
            };
            self.io.stats.rx_frames = self.io.stats.rx_frames.saturating_add(1);
            self.route_frame(port, &frame, hooks);
        }
    }

    fn route_frame<H: StackHooks>(&mut self, port: u8, frame: &CanFrame, hooks: &mut H) {
        let id = frame.id;
        let message = ReceivedMessage {
            pgn: id.pgn(),
            source: id.source_address(),
            destination: id.destination_or_global(),
            priority: id.priority(),
            port,
            payload: frame.payload(),
        };
        if message.destination != GLOBAL_ADDRESS
            && message.destination != self.claimer.address()
            && message.pgn != PGN_ADDRESS_CLAIM
        {
            return;
        }

        match message.pgn {
            TP_CM_PGN => self.on_transport_control(&message, hooks),
            TP_DT_PGN => self.on_transport_data(&message, hooks),
            pgn if lookup(self.config.pgn_table, pgn).is_some_and(|info| info.is_fast_packet()) => {
                self.on_fast_packet(&message, hooks)
            }
            pgn => {
                if is_stack_pgn(pgn) || hooks.accepts(pgn) {
                    self.dispatch(&message, hooks);
                }
            }
        }
    }

    //==================================================================================FAST_PACKET

    fn on_fast_packet<H: StackHooks>(&mut self, message: &ReceivedMessage<'_>, hooks: &mut H) {
        let data = message.payload;
        if data.len() != 8 {
            self.io
                .raise(hooks, ErrorSource::FastPacket, ErrorCode::BadLength);
            self.acknowledge(
                message.pgn,
                AckStatus::Nak,
                AckReason::DlcInvalid,
                message.source,
                message.port,
                hooks,
            );
            return;
        }

        let wait = self.io.fast_packet_wait;
        let session = self.io.normal.find(|dob| {
            dob.port == message.port && assembler::matches(dob, message.pgn, message.source, data)
        });
        if let Some(key) = session {
            let io = &mut self.io;
            let Some(dob) = io.normal.get_mut(key) else {
                return;
            };
            if assembler::accept_frame(dob, data, &mut io.heap, wait) == ProcessResult::MessageComplete
            {
                if let Some(dob) = self.io.normal.release(key) {
                    self.deliver(dob, hooks);
                }
            }
            return;
        }

        // a continuation whose first frame was missed
        if data[0] & 0x1F != 0 {
            return;
        }
        if !is_stack_pgn(message.pgn) && !hooks.accepts(message.pgn) {
            return;
        }
        let key = assembler::SessionKey {
            pgn: message.pgn,
            source: message.source,
            destination: message.destination,
            port: message.port,
            priority: message.priority,
        };
        match assembler::open(key, data, &mut self.io.heap, wait) {
            Ok((dob, ProcessResult::MessageComplete)) => self.deliver(dob, hooks),
            Ok((dob, _)) => {
                if let Err(error) = self.io.queue(dob, false) {
                    self.io.raise(hooks, ErrorSource::FastPacket, error);
                }
            }
            Err(error) => {
                if matches!(error, FastPacketError::Heap(_)) {
                    CommStats::bump(&mut self.io.stats.malloc_fail);
                }
                self.io.raise(hooks, ErrorSource::FastPacket, error);
            }
        }
    }

    //==================================================================================MULTIPACKET

    /// Open reassembly from `source` on `port`, broadcast or addressed to us.
    fn rx_session(&self, source: u8, broadcast: bool, port: u8) -> Option<DobKey> {
        self.io.normal.find(|dob| {
            dob.role == DobRole::MultipacketRx
                && dob.source == source
                && dob.port == port
                && dob.flags.has(DobFlags::BAM) == broadcast
        })
    }

    /// Own unicast transmit of `pgn` to `peer` with its session open.
    fn tx_session(&self, peer: u8, pgn: u32, port: u8) -> Option<DobKey> {
        let matches = |dob: &Dob| {
            dob.role == DobRole::AppTx
                && dob.flags.has(DobFlags::MULTIPACKET)
                && !dob.flags.has(DobFlags::BAM)
                && dob.destination == peer
                && dob.pgn == pgn
                && dob.port == port
                && dob.total_frames > 0
                && dob.state != DobState::Complete
        };
        self.io
            .normal
            .find(matches)
            .or_else(|| self.io.vip.find(matches))
    }

    fn on_transport_control<H: StackHooks>(
        &mut self,
        message: &ReceivedMessage<'_>,
        hooks: &mut H,
    ) {
        let Some(control) = TpCm::decode(message.payload) else {
            self.io
                .raise(hooks, ErrorSource::Multipacket, ErrorCode::Malformed);
            return;
        };
        let (source, port) = (message.source, message.port);
        let me = self.claimer.address();

        match control {
            TpCm::Rts { pgn, .. } => {
                if message.destination == GLOBAL_ADDRESS {
                    return;
                }
                if !is_stack_pgn(pgn) && !hooks.accepts(pgn) {
                    let refusal = TpCm::Abort {
                        reason: AbortReason::Unspecified,
                        pgn,
                    };
                    self.io.queue_tp(refusal, me, source, port, hooks);
                    return;
                }
                // a new RTS from the same peer replaces its session
                if let Some(key) = self.rx_session(source, false, port) {
                    self.io.discard(key, hooks);
                }

                let key = SessionKey {
                    source,
                    destination: me,
                    port,
                };
                let window = self.config.max_frames_per_cts;
                let opened = receiver::on_rts(key, control, window, &mut self.io.heap, &self.io.timers);
                let reply = match opened {
                    Ok((dob, cts)) => match self.io.queue(dob, false) {
                        Ok(_) => cts,
                        Err(error) => {
                            self.io.raise(hooks, ErrorSource::Multipacket, error);
                            TpCm::Abort {
                                reason: AbortReason::Resources,
                                pgn,
                            }
                        }
                    },
                    Err(reason) => {
                        if reason == AbortReason::Resources {
                            CommStats::bump(&mut self.io.stats.malloc_fail);
                        }
                        self.io
                            .raise(hooks, ErrorSource::Multipacket, ErrorCode::Abort(reason));
                        TpCm::Abort { reason, pgn }
                    }
                };
                self.io.queue_tp(reply, me, source, port, hooks);
            }
            TpCm::Bam { size, pgn, .. } => {
                if message.destination != GLOBAL_ADDRESS {
                    return;
                }
                if !is_stack_pgn(pgn) && !hooks.accepts(pgn) {
                    return;
                }
                if let Some(key) = self.rx_session(source, true, port) {
                    self.io.discard(key, hooks);
                }

                let key = SessionKey {
                    source,
                    destination: GLOBAL_ADDRESS,
                    port,
                };
                match receiver::on_bam(key, control, &mut self.io.heap, &self.io.timers) {
                    Some(dob) => {
                        if let Err(error) = self.io.queue(dob, false) {
                            self.io.raise(hooks, ErrorSource::Multipacket, error);
                        }
                    }
                    None if self.io.heap.free_bytes() < size as usize => {
                        CommStats::bump(&mut self.io.stats.malloc_fail);
                        self.io.raise(
                            hooks,
                            ErrorSource::Multipacket,
                            ErrorCode::Abort(AbortReason::Resources),
                        );
                    }
                    None => self.io.raise(
                        hooks,
                        ErrorSource::Multipacket,
                        ErrorCode::Abort(AbortReason::BadSize),
                    ),
                }
            }
            TpCm::Cts { count, next, pgn } => {
                let Some(key) = self.tx_session(source, pgn, port) else {
                    CommStats::bump(&mut self.io.stats.late_cts);
                    return;
                };
                let io = &mut self.io;
                let Some(dob) = pick(&mut io.normal, &mut io.vip, key) else {
                    return;
                };
                if let CtsOutcome::Abort(reason) = sender::on_cts(dob, count, next, &io.timers) {
                    io.queue_tp(TpCm::Abort { reason, pgn }, me, source, port, hooks);
                }
            }
            TpCm::Eom { pgn, .. } => match self.tx_session(source, pgn, port) {
                Some(key) => {
                    if let Some(dob) = self.io.dob_mut(key) {
                        sender::on_eom(dob);
                    }
                }
                None => CommStats::bump(&mut self.io.stats.late_eom),
            },
            TpCm::Abort { reason, pgn } => {
                if let Some(key) = self.tx_session(source, pgn, port) {
                    if let Some(dob) = self.io.dob_mut(key) {
                        sender::on_abort(dob, reason);
                    }
                    return;
                }
                let receiving = self
                    .rx_session(source, false, port)
                    .filter(|&key| self.io.normal.get(key).is_some_and(|dob| dob.pgn == pgn));
                match receiving {
                    Some(key) => {
                        self.io.discard(key, hooks);
                        self.io
                            .raise(hooks, ErrorSource::Multipacket, ErrorCode::Abort(reason));
                    }
                    None => CommStats::bump(&mut self.io.stats.late_abort),
                }
            }
        }
    }

    fn on_transport_data<H: StackHooks>(&mut self, message: &ReceivedMessage<'_>, hooks: &mut H) {
        let broadcast = message.destination == GLOBAL_ADDRESS;
        let (source, port) = (message.source, message.port);
        let Some(key) = self.rx_session(source, broadcast, port) else {
            CommStats::bump(&mut self.io.stats.late_xfer);
            return;
        };
        let me = self.claimer.address();
        let window = self.config.max_frames_per_cts;

        let io = &mut self.io;
        let Some(dob) = io.normal.get_mut(key) else {
            return;
        };
        let pgn = dob.pgn;
        match receiver::on_data(dob, message.payload, window, &mut io.heap, &io.timers) {
            DataOutcome::Consumed | DataOutcome::Duplicate => {}
            DataOutcome::WindowDone(cts) => {
                self.io.queue_tp(cts, me, source, port, hooks);
            }
            DataOutcome::Complete(eom) => {
                if let Some(eom) = eom {
                    self.io.queue_tp(eom, me, source, port, hooks);
                }
                if let Some(dob) = self.io.normal.release(key) {
                    self.deliver(dob, hooks);
                }
            }
            DataOutcome::Abort(reason) => {
                if !broadcast {
                    self.io
                        .queue_tp(TpCm::Abort { reason, pgn }, me, source, port, hooks);
                }
                self.io.discard(key, hooks);
                self.io
                    .raise(hooks, ErrorSource::Multipacket, ErrorCode::Abort(reason));
            }
        }
    }

    //==================================================================================DISPATCH

    /// Hand a reassembled message over and free its buffer.
    fn deliver<H: StackHooks>(&mut self, dob: Dob, hooks: &mut H) {
        if is_stack_pgn(dob.pgn) {
            let mut buffer = [0u8; STACK_PAYLOAD_MAX];
            let bytes = dob.payload(&self.io.heap);
            let len = bytes.len().min(STACK_PAYLOAD_MAX);
            buffer[..len].copy_from_slice(&bytes[..len]);
            self.io.free(dob.data_from_heap(), hooks);
            self.dispatch(&message_of(&dob, &buffer[..len]), hooks);
        } else {
            hooks.on_message(&message_of(&dob, dob.payload(&self.io.heap)));
            self.io.free(dob.data_from_heap(), hooks);
        }
    }

    fn dispatch<H: StackHooks>(&mut self, message: &ReceivedMessage<'_>, hooks: &mut H) {
        match message.pgn {
            PGN_ISO_REQUEST => self.on_iso_request(message, hooks),
            PGN_ADDRESS_CLAIM => self.on_address_claim(message, hooks),
            PGN_COMMANDED_ADDRESS => self.on_commanded_address(message, hooks),
            PGN_NAME_CONFIG => self.on_name_config(message, hooks),
            _ => hooks.on_message(message),
        }
    }

    fn on_address_claim<H: StackHooks>(&mut self, message: &ReceivedMessage<'_>, hooks: &mut H) {
        let Some(name) = IsoName::from_payload(message.payload) else {
            self.io
                .raise(hooks, ErrorSource::AddressClaim, ClaimError::InvalidFrame);
            return;
        };
        let source = message.source;
        let mine = self.claimer.name();

        // a challenger we beat never holds the address
        if source != self.claimer.address() || !(name == mine || mine.outranks(&name)) {
            let recorded = self
                .roster
                .record_claim(name, source, &mut |change, old, new, node| {
                    hooks.on_node_change(change, old, new, node)
                });
            if let Err(error) = recorded {
                self.io.raise(hooks, ErrorSource::AddressClaim, error);
            }
        }

        let ports = self.config.ports;
        self.claimer
            .on_claim(source, name, &mut ClaimLink::new(&mut self.io, hooks, ports));
    }

    fn on_iso_request<H: StackHooks>(&mut self, message: &ReceivedMessage<'_>, hooks: &mut H) {
        let Ok(request) = message.decode::<Pgn59904>() else {
            self.io.raise(hooks, ErrorSource::Inbound, ErrorCode::Malformed);
            return;
        };
        let requester = message.source;
        let unicast = message.destination != GLOBAL_ADDRESS;
        let reply_to = if unicast && requester != NULL_ADDRESS {
            requester
        } else {
            GLOBAL_ADDRESS
        };
        let ports = self.config.ports;

        match request.pgn {
            PGN_ADDRESS_CLAIM => {
                let mut link = ClaimLink::new(&mut self.io, hooks, ports);
                self.claimer.on_request(requester, &mut link);
            }
            _ if !self.claimer.on_line() => {}
            PGN_NAME_CONFIG => {
                let mut reported = false;
                let scopes = [ConfigScope::User, ConfigScope::Oem, ConfigScope::Factory];
                for (count, scope) in (1u8..).zip(scopes) {
                    if let Some(report) = name_config::report(scope, count, hooks) {
                        let route = self.reply_route(PGN_NAME_CONFIG, reply_to, message.port);
                        self.io
                            .queue_record(self.config.pgn_table, route, &report, hooks);
                        reported = true;
                    }
                }
                if !reported && unicast {
                    self.acknowledge(
                        PGN_NAME_CONFIG,
                        AckStatus::Nak,
                        AckReason::NotAvailable,
                        requester,
                        message.port,
                        hooks,
                    );
                }
            }
            PGN_COMM_STATS => {
                let report = self.io.stats.to_report(ports);
                let route = self.reply_route(PGN_COMM_STATS, reply_to, message.port);
                self.io
                    .queue_record(self.config.pgn_table, route, &report, hooks);
            }
            pgn => {
                let refusal = match hooks.on_request(pgn, requester) {
                    RequestReply::Handled => None,
                    RequestReply::Deny => Some((AckStatus::Deny, AckReason::DoNotCare)),
                    RequestReply::Unsupported => Some((AckStatus::Nak, AckReason::Unsupported)),
                };
                if let Some((status, reason)) = refusal.filter(|_| unicast) {
                    self.acknowledge(pgn, status, reason, requester, message.port, hooks);
                }
            }
        }
    }

    fn on_commanded_address<H: StackHooks>(
        &mut self,
        message: &ReceivedMessage<'_>,
        hooks: &mut H,
    ) {
        let Ok(command) = message.decode::<Pgn65240>() else {
            self.io.raise(hooks, ErrorSource::Inbound, ErrorCode::Malformed);
            return;
        };
        let from_tool = self.roster.is_diagnostic_tool(message.source);
        let new_address = command.new_source_address;
        let Some((status, reason)) =
            self.claimer
                .check_commanded_address(command.name, new_address, from_tool)
        else {
            return;
        };
        self.acknowledge(
            PGN_COMMANDED_ADDRESS,
            status,
            reason,
            message.source,
            message.port,
            hooks,
        );
        if status == AckStatus::Ack {
            let ports = self.config.ports;
            self.claimer
                .move_to(new_address, &mut ClaimLink::new(&mut self.io, hooks, ports));
        }
    }

    fn on_name_config<H: StackHooks>(&mut self, message: &ReceivedMessage<'_>, hooks: &mut H) {
        let Ok(command) = message.decode::<Pgn126720>() else {
            self.io
                .raise(hooks, ErrorSource::NameConfig, ErrorCode::Malformed);
            return;
        };
        if !command.is_command() {
            hooks.on_message(message);
            return;
        }

        let origin = CommandOrigin {
            broadcast: message.destination == GLOBAL_ADDRESS,
            from_diagnostic_tool: self.roster.is_diagnostic_tool(message.source),
            allowed: hooks.config_allowed(PGN_NAME_CONFIG),
        };
        let reply = name_config::handle_command(&command, origin, hooks);
        self.acknowledge(
            PGN_NAME_CONFIG,
            reply.status,
            reply.reason,
            message.source,
            message.port,
            hooks,
        );
        if let Some(name) = reply.reload {
            let ports = self.config.ports;
            self.claimer
                .reload_name(name, &mut ClaimLink::new(&mut self.io, hooks, ports));
        }
    }

    fn reply_route(&self, pgn: u32, destination: u8, port: u8) -> Route {
        Route {
            pgn,
            priority: lookup(self.config.pgn_table, pgn).map_or(DEFAULT_PRIORITY, |info| info.priority),
            source: self.claimer.address(),
            destination,
            port,
        }
    }
}
