//! Outbound drain: walks both pools once per tick, writes ready frames within the
//! per-tick budget and retires finished transfers.
use super::{CommStats, Disposition, ErrorCode, ErrorSource, Stack, StackHooks};
use crate::protocol::transport::dob::{DobFlags, DobRole, DobState, OutputStatus, TransferOutcome};
use crate::protocol::transport::multipacket::sender::{self, TxTimeout};
use crate::protocol::transport::multipacket::{AbortReason, TpCm};
use crate::protocol::transport::pool::{DobKey, PoolKind};
use crate::protocol::transport::traits::can_driver::{CanDriver, SendStatus};
use crate::protocol::transport::GLOBAL_ADDRESS;

/// State of one drain of one port.
struct Pass {
    port: u8,
    /// Frames still allowed this tick.
    budget: u8,
    /// The driver reported no free slot; stop writing.
    busy: bool,
}

impl<const HEAP: usize, const NODES: usize> Stack<HEAP, NODES> {
    pub(super) fn pump_outbound<D: CanDriver, H: StackHooks>(
        &mut self,
        port: u8,
        driver: &mut D,
        hooks: &mut H,
    ) {
        let mut pass = Pass {
            port,
            budget: self.config.max_tx_frames_per_tick,
            busy: false,
        };
        self.drain(PoolKind::Vip, &mut pass, driver, hooks);
        self.drain(PoolKind::Normal, &mut pass, driver, hooks);
    }

    fn first_in(&self, pool: PoolKind) -> Option<DobKey> {
        match pool {
            PoolKind::Normal => self.io.normal.first_used(),
            PoolKind::Vip => self.io.vip.first_used(),
        }
    }

    fn next_in(&self, key: DobKey) -> Option<DobKey> {
        match key.pool {
            PoolKind::Normal => self.io.normal.next_used(key),
            PoolKind::Vip => self.io.vip.next_used(key),
        }
    }

    fn drain<D: CanDriver, H: StackHooks>(
        &mut self,
        pool: PoolKind,
        pass: &mut Pass,
        driver: &mut D,
        hooks: &mut H,
    ) {
        // claims and control frames leave before the address is settled
        let writable = pool == PoolKind::Vip || self.claimer.on_line();
        let mut cursor = self.first_in(pool);
        while let Some(key) = cursor {
            cursor = self.next_in(key);
            let on_port = self
                .transfer(key)
                .is_some_and(|dob| dob.port == pass.port);
            if on_port {
                self.service(key, writable, pass, driver, hooks);
            }
        }
    }

    /// Advance one DOB as far as it goes this tick.
    fn service<D: CanDriver, H: StackHooks>(
        &mut self,
        key: DobKey,
        writable: bool,
        pass: &mut Pass,
        driver: &mut D,
        hooks: &mut H,
    ) {
        let mut tick = true;
        loop {
            let Some(dob) = self.io.dob_mut(key) else {
                return;
            };
            let status = dob.output_status(tick);
            tick = false;

            match status {
                OutputStatus::Ok => return,
                OutputStatus::FrameReady => {
                    if !writable || pass.busy || pass.budget == 0 {
                        return;
                    }
                    let opening = dob.flags.has(DobFlags::MULTIPACKET)
                        && !dob.flags.has(DobFlags::IS_RECV)
                        && dob.role == DobRole::AppTx
                        && dob.total_frames == 0;
                    if opening {
                        if !self.open_session(key, hooks) {
                            return;
                        }
                        continue;
                    }

                    let io = &mut self.io;
                    let Some(dob) = super::pick(&mut io.normal, &mut io.vip, key) else {
                        return;
                    };
                    match dob.write(&io.heap, driver) {
                        Ok(()) => {
                            io.stats.tx_frames = io.stats.tx_frames.saturating_add(1);
                            pass.budget -= 1;
                        }
                        Err(SendStatus::Busy) => {
                            pass.busy = true;
                            return;
                        }
                        Err(SendStatus::Error) => {
                            io.stats.port_error(pass.port);
                            io.raise(hooks, ErrorSource::Outbound, ErrorCode::Transmit);
                        }
                    }
                }
                OutputStatus::Status => {
                    dob.do_status(driver);
                    if dob.state == DobState::Status {
                        return;
                    }
                }
                OutputStatus::Delete | OutputStatus::TimedOut => {
                    if !self.finish(key, status, driver, hooks) {
                        return;
                    }
                }
            }
        }
    }

    /// Role-specific end of a DOB. Returns `true` when the DOB lives on and should be
    /// polled again right away.
    fn finish<D: CanDriver, H: StackHooks>(
        &mut self,
        key: DobKey,
        status: OutputStatus,
        driver: &mut D,
        hooks: &mut H,
    ) -> bool {
        let timed_out = status == OutputStatus::TimedOut;
        let io = &mut self.io;
        let Some(dob) = super::pick(&mut io.normal, &mut io.vip, key) else {
            return false;
        };

        let role = dob.role;
        match role {
            DobRole::AppTx => {
                if timed_out {
                    if dob.flags.has(DobFlags::MULTIPACKET) && dob.total_frames > 0 {
                        match sender::on_tx_timeout(dob, &io.timers) {
                            TxTimeout::Continue => return true,
                            TxTimeout::Done => {}
                            TxTimeout::Failed => {
                                let (pgn, source, destination, port) =
                                    (dob.pgn, dob.source, dob.destination, dob.port);
                                CommStats::bump(&mut io.stats.mp_tx_timeout);
                                let abort = TpCm::Abort {
                                    reason: AbortReason::Timeout,
                                    pgn,
                                };
                                io.queue_tp(abort, source, destination, port, hooks);
                                io.raise(
                                    hooks,
                                    ErrorSource::Multipacket,
                                    ErrorCode::Abort(AbortReason::Timeout),
                                );
                            }
                        }
                    } else {
                        dob.terminating_status = TransferOutcome::TimedOut;
                        dob.state = DobState::Complete;
                    }
                }
                let Some(dob) = io.dob_mut(key) else {
                    return false;
                };
                let (tag, outcome) = (dob.tag, dob.terminating_status);
                if hooks.on_transfer_done(tag, outcome) == Disposition::Retain {
                    return false;
                }
            }
            DobRole::FastPacketRx | DobRole::MultipacketRx if timed_out => {
                let multipacket = role == DobRole::MultipacketRx;
                let unicast_session = multipacket && !dob.flags.has(DobFlags::BAM);
                let (pgn, source, destination, port) =
                    (dob.pgn, dob.source, dob.destination, dob.port);
                CommStats::bump(&mut io.stats.mp_rx_timeout);
                if unicast_session {
                    let abort = TpCm::Abort {
                        reason: AbortReason::Timeout,
                        pgn,
                    };
                    io.queue_tp(abort, destination, source, port, hooks);
                }
                let layer = if multipacket {
                    ErrorSource::Multipacket
                } else {
                    ErrorSource::FastPacket
                };
                io.raise(hooks, layer, ErrorCode::Abort(AbortReason::Timeout));
            }
            DobRole::FastPacketRx | DobRole::MultipacketRx | DobRole::Control => {}
        }

        if let Some(dob) = self.io.discard(key, hooks) {
            if let Some(handle) = dob.tx_handle {
                driver.clear_handle(dob.port, handle);
            }
        }
        false
    }

    /// Announce the multipacket transfer behind `key`.
    ///
    /// Returns `false` when another own session is still open; the DOB waits its turn.
    fn open_session<H: StackHooks>(&mut self, key: DobKey, hooks: &mut H) -> bool {
        let me = self.claimer.address();
        let busy = self.io.normal.find(|other| sender::is_open_session(other, me)).is_some()
            || self.io.vip.find(|other| sender::is_open_session(other, me)).is_some();
        if busy {
            return false;
        }

        let window = self.config.max_frames_per_cts;
        let io = &mut self.io;
        let Some(dob) = super::pick(&mut io.normal, &mut io.vip, key) else {
            return false;
        };
        let announce = sender::start_tx(dob, window, &io.timers);
        let destination = if dob.flags.has(DobFlags::BAM) {
            GLOBAL_ADDRESS
        } else {
            dob.destination
        };
        let (source, port) = (dob.source, dob.port);

        if !io.queue_tp(announce, source, destination, port, hooks) {
            if let Some(dob) = io.dob_mut(key) {
                sender::on_abort(dob, AbortReason::Resources);
            }
        }
        true
    }
}
