//! Tick-driven frame pump tying the transport, the address claim and the application
//! together.
//!
//! A [`Stack`] owns every buffer it needs: the payload heap, the two DOB pools, the
//! node roster and the claim state machine. The application calls [`Stack::begin`]
//! once, then [`Stack::tick`] every `ms_per_tick` with its [`CanDriver`] and its
//! [`StackHooks`]. Each tick runs, in order:
//!
//! 1. the address-claim protocol timer;
//! 2. roster countdowns and the claim refresh;
//! 3. inbound frames, per port, up to `max_rx_frames_per_tick`;
//! 4. outbound frames, per port, up to `max_tx_frames_per_tick`, VIP pool first.
//!
//! Application traffic queued with [`Stack::send`] only leaves once the address is
//! claimed; claims, acknowledgements and TP.CM control frames always do.
//!
//! ```rust
//! use korri_rvc::protocol::managment::iso_name::IsoName;
//! use korri_rvc::protocol::stack::{hooks::{Persistence, StackHooks}, Stack, StackConfig};
//! use korri_rvc::protocol::transport::can_frame::CanFrame;
//! use korri_rvc::protocol::transport::traits::can_driver::{CanDriver, SendStatus, TxHandle};
//!
//! struct Loopback;
//! impl CanDriver for Loopback {
//!     fn send_frame(&mut self, _port: u8, _frame: &CanFrame) -> Result<TxHandle, SendStatus> {
//!         Ok(TxHandle(0))
//!     }
//!     fn receive_frame(&mut self, _port: u8) -> Option<CanFrame> {
//!         None
//!     }
//! }
//!
//! struct App;
//! impl Persistence for App {}
//! impl StackHooks for App {}
//!
//! let name = IsoName::builder()
//!     .unique_number(42)
//!     .device_function(140)
//!     .arbitrary_address_capable(true)
//!     .build();
//! let mut stack = Stack::<2048, 16>::new(StackConfig::new(name));
//! let (mut driver, mut app) = (Loopback, App);
//! stack.begin(&mut app).unwrap();
//! for _ in 0..100 {
//!     stack.tick(&mut driver, &mut app);
//! }
//! assert!(stack.is_online());
//! ```
use crate::core::SINGLE_FRAME_LEN;
use crate::error::{ClaimError, HeapError, PersistError, PoolError, SendError};
use crate::infra::codec::traits::PgnData;
use crate::infra::heap::{Heap, HeapHandle};
use crate::protocol::managment::address_claiming::{AddressClaimer, ClaimContext, ClaimState};
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::managment::name_config;
use crate::protocol::managment::roster::{NodeChange, Roster};
use crate::protocol::messages::registry::{lookup, transport_for};
use crate::protocol::messages::{
    AckReason, AckStatus, ConfigScope, Pgn59392, Pgn59904, PgnInfo, Transport,
    PGN_ADDRESS_CLAIM, PGN_ISO_ACK, PGN_ISO_REQUEST,
};
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::dob::{Dob, DobData, DobFlags, DobRole, DobState};
use crate::protocol::transport::fast_packet::{SequenceTable, MAX_FAST_PACKET_PAYLOAD};
use crate::protocol::transport::multipacket::{
    MultipacketTimers, TpCm, MAX_MULTIPACKET_PAYLOAD,
};
use crate::protocol::transport::pool::{
    DobKey, Pool, PoolKind, NORMAL_POOL_CAPACITY, VIP_POOL_CAPACITY,
};
use crate::protocol::transport::traits::can_driver::CanDriver;
use crate::protocol::transport::{
    ms_to_ticks, FAST_PACKET_WAIT_MS, GLOBAL_ADDRESS, NULL_ADDRESS, PGN_TTL_MS,
};

pub mod config;
pub mod hooks;
mod inbound;
mod outbound;
pub mod runner;
pub mod stats;
pub mod wake;

pub use config::StackConfig;
pub use hooks::{
    Disposition, ParamType, Persistence, ReceivedMessage, RequestReply, StackHooks,
};
pub use stats::{CommStats, ErrorCode, ErrorSource};
pub use wake::WakeFlag;

/// Priority used when neither the request nor the registry gives one.
const DEFAULT_PRIORITY: u8 = 6;

//==================================================================================SEND_REQUEST
/// An application message to queue with [`Stack::send`].
#[derive(Debug, Clone, Copy)]
pub struct SendRequest<'a> {
    pub pgn: u32,
    pub destination: u8,
    /// Registry priority (or 6) when `None`.
    pub priority: Option<u8>,
    pub payload: &'a [u8],
    /// Handed back to [`StackHooks::on_transfer_done`].
    pub tag: Option<u32>,
    /// Queue on the high-priority pool.
    pub vip: bool,
    pub port: u8,
}

impl<'a> SendRequest<'a> {
    /// Broadcast of `payload` on port 0.
    pub const fn new(pgn: u32, payload: &'a [u8]) -> Self {
        Self {
            pgn,
            destination: GLOBAL_ADDRESS,
            priority: None,
            payload,
            tag: None,
            vip: false,
            port: 0,
        }
    }

    pub const fn to(mut self, destination: u8) -> Self {
        self.destination = destination;
        self
    }

    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub const fn with_tag(mut self, tag: u32) -> Self {
        self.tag = Some(tag);
        self
    }

    pub const fn vip(mut self) -> Self {
        self.vip = true;
        self
    }

    pub const fn on_port(mut self, port: u8) -> Self {
        self.port = port;
        self
    }
}

/// Where the bytes of an outgoing payload come from.
#[derive(Clone, Copy)]
enum Payload<'a> {
    /// Copied inline or onto the heap.
    Copied(&'a [u8]),
    Static(&'static [u8]),
}

impl Payload<'_> {
    fn len(&self) -> usize {
        match self {
            Payload::Copied(bytes) => bytes.len(),
            Payload::Static(bytes) => bytes.len(),
        }
    }
}

/// Addressing of a stack-generated message.
#[derive(Debug, Clone, Copy)]
struct Route {
    pgn: u32,
    priority: u8,
    source: u8,
    destination: u8,
    port: u8,
}

//==================================================================================RESOURCES
/// Buffers and counters shared by the claim link, the inbound router and the drain.
struct Resources<const HEAP: usize> {
    heap: Heap<HEAP>,
    normal: Pool<NORMAL_POOL_CAPACITY>,
    vip: Pool<VIP_POOL_CAPACITY>,
    sequences: SequenceTable,
    timers: MultipacketTimers,
    stats: CommStats,
    last_error: Option<(ErrorSource, ErrorCode)>,
    ttl_ticks: i32,
    fast_packet_wait: i32,
}

/// DOB behind `key`, whichever pool holds it.
fn pick<'p>(
    normal: &'p mut Pool<NORMAL_POOL_CAPACITY>,
    vip: &'p mut Pool<VIP_POOL_CAPACITY>,
    key: DobKey,
) -> Option<&'p mut Dob> {
    match key.pool {
        PoolKind::Normal => normal.get_mut(key),
        PoolKind::Vip => vip.get_mut(key),
    }
}

impl<const HEAP: usize> Resources<HEAP> {
    fn raise<H: StackHooks + ?Sized>(
        &mut self,
        hooks: &mut H,
        source: ErrorSource,
        code: impl Into<ErrorCode>,
    ) {
        let code = code.into();
        #[cfg(feature = "defmt")]
        defmt::warn!("{} error: {}", source, code);
        self.last_error = Some((source, code));
        hooks.on_error(source, code);
    }

    fn dob_mut(&mut self, key: DobKey) -> Option<&mut Dob> {
        pick(&mut self.normal, &mut self.vip, key)
    }

    /// Store `dob` in its pool. On failure its heap payload is released.
    fn queue(&mut self, dob: Dob, vip: bool) -> Result<DobKey, PoolError> {
        let handle = dob.data_from_heap();
        let result = if vip {
            self.vip.acquire(dob)
        } else {
            self.normal.acquire(dob)
        };
        if result.is_err() {
            CommStats::bump(&mut self.stats.malloc_fail);
            if let Some(handle) = handle {
                let released = self.heap.release(handle);
                debug_assert!(released.is_ok(), "payload of a refused DOB already freed");
            }
        }
        result
    }

    fn allocate(&mut self, len: usize) -> Result<HeapHandle, HeapError> {
        self.heap.allocate(len).inspect_err(|_| {
            CommStats::bump(&mut self.stats.malloc_fail);
        })
    }

    /// DOB carrying `payload` with the framing its PGN and length call for.
    fn build(
        &mut self,
        table: &'static [PgnInfo],
        route: Route,
        payload: Payload<'_>,
        role: DobRole,
    ) -> Result<Dob, SendError> {
        let len = payload.len();
        let transport = match transport_for(table, route.pgn, len) {
            Transport::Multipacket if len <= SINGLE_FRAME_LEN => Transport::Single,
            transport => transport,
        };
        let limit = match transport {
            Transport::Single => SINGLE_FRAME_LEN,
            Transport::FastPacket => MAX_FAST_PACKET_PAYLOAD,
            Transport::Multipacket => MAX_MULTIPACKET_PAYLOAD,
        };
        if len > limit {
            return Err(SendError::PayloadTooLarge { len });
        }

        let mut dob = Dob::new(route.pgn, route.priority, role, self.ttl_ticks);
        dob.source = route.source;
        dob.destination = route.destination;
        dob.port = route.port;
        match payload {
            Payload::Static(bytes) => {
                dob.data = DobData::Static(bytes);
                dob.len = len as u16;
            }
            Payload::Copied(bytes) if len <= SINGLE_FRAME_LEN => dob.set_inline(bytes),
            Payload::Copied(bytes) => {
                let handle = self.allocate(len)?;
                self.heap.bytes_mut(handle).copy_from_slice(bytes);
                dob.data = DobData::Heap(handle);
                dob.len = len as u16;
            }
        }

        match transport {
            Transport::Single => {}
            Transport::FastPacket => {
                dob.flags.set(DobFlags::FASTPACKET);
                dob.sequence = self.sequences.next(route.pgn);
            }
            // frames are counted when the session opens
            Transport::Multipacket => dob.flags.set(DobFlags::MULTIPACKET),
        }
        dob.state = DobState::Data;
        Ok(dob)
    }

    /// Queue a single stack frame on the VIP pool.
    fn queue_frame<H: StackHooks + ?Sized>(&mut self, route: Route, payload: &[u8], hooks: &mut H) {
        let mut dob = Dob::control(
            route.pgn,
            route.priority,
            route.source,
            route.destination,
            payload,
            DobState::Data,
            self.ttl_ticks,
        );
        dob.port = route.port;
        dob.flags.set(DobFlags::VIP);
        if let Err(error) = self.queue(dob, true) {
            self.raise(hooks, ErrorSource::Outbound, error);
        }
    }

    /// Queue a TP.CM control message on the VIP pool.
    fn queue_tp<H: StackHooks + ?Sized>(
        &mut self,
        message: TpCm,
        source: u8,
        destination: u8,
        port: u8,
        hooks: &mut H,
    ) -> bool {
        let dob = message.into_dob(source, destination, port, self.ttl_ticks);
        match self.queue(dob, true) {
            Ok(_) => true,
            Err(error) => {
                self.raise(hooks, ErrorSource::Multipacket, error);
                false
            }
        }
    }

    /// Serialize `record` and queue it as a stack message on the normal pool.
    fn queue_record<P: PgnData, H: StackHooks + ?Sized>(
        &mut self,
        table: &'static [PgnInfo],
        route: Route,
        record: &P,
        hooks: &mut H,
    ) {
        let mut buffer = [0u8; MAX_FAST_PACKET_PAYLOAD];
        let Ok(len) = record.to_payload(&mut buffer) else {
            self.raise(hooks, ErrorSource::Outbound, ErrorCode::Malformed);
            return;
        };
        let queued = self
            .build(table, route, Payload::Copied(&buffer[..len]), DobRole::Control)
            .and_then(|dob| Ok(self.queue(dob, false)?));
        match queued {
            Ok(_) => {}
            Err(SendError::Heap(error)) => self.raise(hooks, ErrorSource::Outbound, error),
            Err(SendError::Pool(error)) => self.raise(hooks, ErrorSource::Outbound, error),
            Err(_) => self.raise(hooks, ErrorSource::Outbound, ErrorCode::BadLength),
        }
    }

    /// Take `key` out of its pool and free its heap payload.
    fn discard<H: StackHooks + ?Sized>(&mut self, key: DobKey, hooks: &mut H) -> Option<Dob> {
        let dob = match key.pool {
            PoolKind::Normal => self.normal.release(key),
            PoolKind::Vip => self.vip.release(key),
        }?;
        self.free(dob.data_from_heap(), hooks);
        Some(dob)
    }

    fn free<H: StackHooks + ?Sized>(&mut self, handle: Option<HeapHandle>, hooks: &mut H) {
        if let Some(handle) = handle {
            if let Err(error) = self.heap.release(handle) {
                self.raise(hooks, ErrorSource::Outbound, error);
            }
        }
    }
}

//==================================================================================CLAIM_LINK
/// [`ClaimContext`] over the stack resources and the application hooks.
///
/// Claims are queued on the VIP pool, once per port.
struct ClaimLink<'s, const HEAP: usize, H: StackHooks + ?Sized> {
    io: &'s mut Resources<HEAP>,
    hooks: &'s mut H,
    ports: u8,
}

impl<'s, const HEAP: usize, H: StackHooks + ?Sized> ClaimLink<'s, HEAP, H> {
    fn new(io: &'s mut Resources<HEAP>, hooks: &'s mut H, ports: u8) -> Self {
        Self { io, hooks, ports }
    }

    fn broadcast(&mut self, pgn: u32, source: u8, destination: u8, payload: &[u8]) {
        for port in 0..self.ports {
            let route = Route {
                pgn,
                priority: DEFAULT_PRIORITY,
                source,
                destination,
                port,
            };
            self.io.queue_frame(route, payload, self.hooks);
        }
    }

    fn persist_error(&mut self, error: PersistError) {
        self.io.raise(self.hooks, ErrorSource::AddressClaim, error);
    }
}

impl<const HEAP: usize, H: StackHooks + ?Sized> ClaimContext for ClaimLink<'_, HEAP, H> {
    fn send_claim(&mut self, name: IsoName, source: u8, destination: u8) {
        self.broadcast(PGN_ADDRESS_CLAIM, source, destination, &name.to_le_bytes());
    }

    fn request_claim(&mut self, destination: u8) {
        let mut payload = [0u8; 3];
        if Pgn59904::for_pgn(PGN_ADDRESS_CLAIM)
            .to_payload(&mut payload)
            .is_ok()
        {
            self.broadcast(PGN_ISO_REQUEST, NULL_ADDRESS, destination, &payload);
        }
    }

    fn node_change(&mut self, change: NodeChange, old: u8, new: u8, name: IsoName) {
        self.hooks.on_node_change(change, old, new, name);
    }

    fn load_name(&mut self) -> Option<IsoName> {
        let mut buffer = [0u8; 8];
        let len = self
            .hooks
            .load(ParamType::Name, ConfigScope::User, &mut buffer)
            .ok()?;
        IsoName::from_payload(buffer.get(..len)?)
    }

    fn save_name(&mut self, name: IsoName) {
        if let Err(error) = self
            .hooks
            .save(ParamType::Name, ConfigScope::User, &name.to_le_bytes())
        {
            self.persist_error(error);
        }
    }

    fn load_address(&mut self) -> Option<u8> {
        let mut buffer = [0u8; 1];
        match self
            .hooks
            .load(ParamType::Address, ConfigScope::User, &mut buffer)
        {
            Ok(1) => Some(buffer[0]),
            _ => None,
        }
    }

    fn save_address(&mut self, address: u8) {
        if let Err(error) = self
            .hooks
            .save(ParamType::Address, ConfigScope::User, &[address])
        {
            self.persist_error(error);
        }
    }

    fn claim_error(&mut self, error: ClaimError) {
        self.io.raise(self.hooks, ErrorSource::AddressClaim, error);
    }
}

//==================================================================================STACK
/// One node: `HEAP` bytes of payload storage and a roster of `NODES` remote nodes.
pub struct Stack<const HEAP: usize, const NODES: usize> {
    config: StackConfig,
    claimer: AddressClaimer,
    roster: Roster<NODES>,
    io: Resources<HEAP>,
}

impl<const HEAP: usize, const NODES: usize> Stack<HEAP, NODES> {
    pub fn new(config: StackConfig) -> Self {
        let ms = config.ms_per_tick;
        let claimer = AddressClaimer::new(config.name, ms, config.seed())
            .with_rvc_diag(config.rvc_diag_claim)
            .with_refresh(config.claim_refresh_ms);
        Self {
            config,
            claimer,
            roster: Roster::new(ms_to_ticks(config.roster_timeout_ms, ms)),
            io: Resources {
                heap: Heap::new(),
                normal: Pool::new(PoolKind::Normal),
                vip: Pool::new(PoolKind::Vip),
                sequences: SequenceTable::new(),
                timers: MultipacketTimers::new(ms),
                stats: CommStats::new(),
                last_error: None,
                ttl_ticks: ms_to_ticks(PGN_TTL_MS, ms),
                fast_packet_wait: ms_to_ticks(FAST_PACKET_WAIT_MS, ms),
            },
        }
    }

    /// Load the persisted identity and start claiming.
    pub fn begin<H: StackHooks>(&mut self, hooks: &mut H) -> Result<(), ClaimError> {
        let mut link = ClaimLink::new(&mut self.io, hooks, self.config.ports);
        self.claimer.begin(&mut link).inspect_err(|error| {
            link.claim_error(*error);
        })
    }

    /// Run one tick.
    pub fn tick<D: CanDriver, H: StackHooks>(&mut self, driver: &mut D, hooks: &mut H) {
        let ports = self.config.ports;
        self.claimer
            .tick(&mut ClaimLink::new(&mut self.io, hooks, ports));

        let (claimer, io) = (&mut self.claimer, &mut self.io);
        self.roster.tick(|entry| {
            hooks.on_node_change(NodeChange::TimedOut, entry.address, GLOBAL_ADDRESS, entry.name);
            claimer.on_node_expired(
                entry.address,
                &mut ClaimLink::new(&mut *io, &mut *hooks, ports),
            );
        });
        self.claimer
            .tick_refresh(&mut ClaimLink::new(&mut self.io, hooks, ports));

        for port in 0..ports {
            self.pump_inbound(port, driver, hooks);
        }
        for port in 0..ports {
            self.pump_outbound(port, driver, hooks);
        }
    }

    //==================================================================================SEND

    /// Queue an application message.
    ///
    /// Payloads over eight bytes are copied onto the heap and framed as fast-packet or
    /// multipacket according to the PGN registry.
    pub fn send(&mut self, request: SendRequest<'_>) -> Result<DobKey, SendError> {
        self.submit(request, Payload::Copied(request.payload))
    }

    /// Queue an application message whose payload is borrowed for the whole transfer.
    pub fn send_static(&mut self, request: SendRequest<'static>) -> Result<DobKey, SendError> {
        self.submit(request, Payload::Static(request.payload))
    }

    /// Serialize `record` through the codec and queue it.
    pub fn send_record<P: PgnData>(
        &mut self,
        pgn: u32,
        record: &P,
        destination: u8,
    ) -> Result<DobKey, SendError> {
        let mut buffer = [0u8; MAX_MULTIPACKET_PAYLOAD];
        let len = record
            .to_payload(&mut buffer)
            .map_err(|_| SendError::Serialization)?;
        self.send(SendRequest::new(pgn, &buffer[..len]).to(destination))
    }

    fn submit(&mut self, request: SendRequest<'_>, payload: Payload<'_>) -> Result<DobKey, SendError> {
        if !self.claimer.on_line() {
            return Err(SendError::NotOnline);
        }
        let priority = request.priority.unwrap_or_else(|| {
            lookup(self.config.pgn_table, request.pgn).map_or(DEFAULT_PRIORITY, |info| info.priority)
        });
        let route = Route {
            pgn: request.pgn,
            priority,
            source: self.claimer.address(),
            destination: request.destination,
            port: request.port,
        };
        CanId::for_pgn(route.pgn, route.priority, route.source, route.destination)?;
        let mut dob = self
            .io
            .build(self.config.pgn_table, route, payload, DobRole::AppTx)?;
        dob.tag = request.tag;
        if request.vip {
            dob.flags.set(DobFlags::VIP);
        }
        Ok(self.io.queue(dob, request.vip)?)
    }

    //==================================================================================NAME_CONFIG

    /// Copy the OEM or factory NAME configuration down and claim with the result.
    pub fn reset_name_config<H: StackHooks>(
        &mut self,
        scope: ConfigScope,
        hooks: &mut H,
    ) -> Result<(), PersistError> {
        let name = name_config::reset(scope, hooks)?;
        let mut link = ClaimLink::new(&mut self.io, hooks, self.config.ports);
        self.claimer.reload_name(name, &mut link);
        Ok(())
    }

    //==================================================================================ACCESSORS

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Current source address (the candidate while claiming).
    pub fn address(&self) -> u8 {
        self.claimer.address()
    }

    pub fn name(&self) -> IsoName {
        self.claimer.name()
    }

    pub fn claim_state(&self) -> ClaimState {
        self.claimer.state()
    }

    /// The address is claimed and application traffic flows.
    pub fn is_online(&self) -> bool {
        self.claimer.on_line()
    }

    pub fn roster(&self) -> &Roster<NODES> {
        &self.roster
    }

    pub fn stats(&self) -> &CommStats {
        &self.io.stats
    }

    /// Count `frames` lost by the driver side before reaching [`tick`](Self::tick).
    pub fn record_rx_overrun(&mut self, frames: u16) {
        self.io.stats.rx_overrun = self.io.stats.rx_overrun.saturating_add(frames);
    }

    pub fn heap(&self) -> &Heap<HEAP> {
        &self.io.heap
    }

    pub fn normal_pool(&self) -> &Pool<NORMAL_POOL_CAPACITY> {
        &self.io.normal
    }

    pub fn vip_pool(&self) -> &Pool<VIP_POOL_CAPACITY> {
        &self.io.vip
    }

    /// Queued transfer behind `key`, while it is alive.
    pub fn transfer(&self, key: DobKey) -> Option<&Dob> {
        match key.pool {
            PoolKind::Normal => self.io.normal.get(key),
            PoolKind::Vip => self.io.vip.get(key),
        }
    }

    pub fn last_error(&self) -> Option<(ErrorSource, ErrorCode)> {
        self.io.last_error
    }

    pub fn take_last_error(&mut self) -> Option<(ErrorSource, ErrorCode)> {
        self.io.last_error.take()
    }

    /// Queue an ISO acknowledgment of `pgn` to `destination`.
    fn acknowledge<H: StackHooks + ?Sized>(
        &mut self,
        pgn: u32,
        status: AckStatus,
        reason: AckReason,
        destination: u8,
        port: u8,
        hooks: &mut H,
    ) {
        let mut payload = [0u8; 8];
        let Ok(len) = Pgn59392::reply(pgn, status, reason).to_payload(&mut payload) else {
            return;
        };
        let route = Route {
            pgn: PGN_ISO_ACK,
            priority: DEFAULT_PRIORITY,
            source: self.claimer.address(),
            destination,
            port,
        };
        self.io.queue_frame(route, &payload[..len], hooks);
    }
}
