//! Test doubles shared by the integration tests: an in-memory bus pair and a tokio
//! timer for the async runner, and a simulated network for tick-driven stacks.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use korri_rvc::error::PersistError;
use korri_rvc::protocol::managment::iso_name::IsoName;
use korri_rvc::protocol::managment::roster::NodeChange;
use korri_rvc::protocol::messages::{PgnInfo, Transport};
use korri_rvc::protocol::stack::hooks::{
    ConfigScope, ParamType, Persistence, ReceivedMessage, StackHooks,
};
use korri_rvc::protocol::stack::{Disposition, ErrorCode, ErrorSource, Stack, StackConfig};
use korri_rvc::protocol::transport::can_frame::CanFrame;
use korri_rvc::protocol::transport::dob::TransferOutcome;
use korri_rvc::protocol::transport::traits::{
    can_bus::CanBus,
    can_driver::{CanDriver, SendStatus, TxHandle},
    korri_timer::KorriTimer,
};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

/// Broadcast PGN without a registry entry: multipacket above eight bytes.
pub const APP_PGN: u32 = 0x1FFFD;
/// Application PGN registered as fast-packet.
pub const FP_PGN: u32 = 0x1FF9C;

pub static APP_TABLE: [PgnInfo; 1] = [PgnInfo::raw(FP_PGN, 3, Transport::FastPacket)];

pub fn node_name(unique: u32, function: u8) -> IsoName {
    IsoName::builder()
        .unique_number(unique)
        .manufacturer_code(119)
        .device_function(function)
        .arbitrary_address_capable(true)
        .build()
}

/// `len` bytes counting up from 1.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}

//==================================================================================ASYNC_BUS

#[derive(Clone)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CanFrame>>>,
}

impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(*frame).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl KorriTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

//==================================================================================HOOKS

/// Hooks keeping every callback and an in-memory store.
#[derive(Default)]
pub struct MemoryHooks {
    pub name: Option<[u8; 8]>,
    pub address: Option<u8>,
    pub configs: [Option<Vec<u8>>; 3],
    pub messages: Vec<(u32, u8, Vec<u8>)>,
    pub transfers: Vec<(Option<u32>, TransferOutcome)>,
    pub node_changes: Vec<(NodeChange, u8, u8, IsoName)>,
    pub errors: Vec<(ErrorSource, ErrorCode)>,
}

impl MemoryHooks {
    pub fn messages_of(&self, pgn: u32) -> impl Iterator<Item = &(u32, u8, Vec<u8>)> + '_ {
        self.messages.iter().filter(move |(p, _, _)| *p == pgn)
    }
}

impl Persistence for MemoryHooks {
    fn load(
        &mut self,
        param: ParamType,
        scope: ConfigScope,
        buffer: &mut [u8],
    ) -> Result<usize, PersistError> {
        let stored = match param {
            ParamType::Name => self.name.map(|name| name.to_vec()),
            ParamType::Address => self.address.map(|address| vec![address]),
            ParamType::NameConfig => self.configs[scope as usize].clone(),
        }
        .ok_or(PersistError::NotFound)?;
        buffer[..stored.len()].copy_from_slice(&stored);
        Ok(stored.len())
    }

    fn save(&mut self, param: ParamType, scope: ConfigScope, data: &[u8]) -> Result<(), PersistError> {
        match param {
            ParamType::Name => {
                self.name = Some(data.try_into().map_err(|_| PersistError::Malformed)?)
            }
            ParamType::Address => self.address = data.first().copied(),
            ParamType::NameConfig => self.configs[scope as usize] = Some(data.to_vec()),
        }
        Ok(())
    }
}

impl StackHooks for MemoryHooks {
    fn on_node_change(&mut self, change: NodeChange, old: u8, new: u8, name: IsoName) {
        self.node_changes.push((change, old, new, name));
    }

    fn on_error(&mut self, source: ErrorSource, code: ErrorCode) {
        self.errors.push((source, code));
    }

    fn on_message(&mut self, message: &ReceivedMessage<'_>) {
        self.messages
            .push((message.pgn, message.source, message.payload.to_vec()));
    }

    fn on_transfer_done(&mut self, tag: Option<u32>, outcome: TransferOutcome) -> Disposition {
        self.transfers.push((tag, outcome));
        Disposition::Dispose
    }
}

//==================================================================================NETWORK

/// Frame filter of the simulated wire: `true` drops the frame.
pub type LossFilter = fn(&CanFrame) -> bool;

/// Shared wire: every frame a node writes reaches the inbox of every other node.
pub struct SimNetwork {
    inboxes: RefCell<Vec<VecDeque<CanFrame>>>,
    log: RefCell<Vec<(usize, CanFrame)>>,
    loss: Cell<Option<LossFilter>>,
}

impl SimNetwork {
    pub fn new(nodes: usize) -> Self {
        Self {
            inboxes: RefCell::new(vec![VecDeque::new(); nodes]),
            log: RefCell::new(Vec::new()),
            loss: Cell::new(None),
        }
    }

    pub fn port(&self, node: usize) -> NodePort<'_> {
        NodePort { net: self, node }
    }

    pub fn set_loss(&self, filter: Option<LossFilter>) {
        self.loss.set(filter);
    }

    /// Frames written by `node` with `pgn`, dropped ones included.
    pub fn sent_by(&self, node: usize, pgn: u32) -> Vec<CanFrame> {
        self.log
            .borrow()
            .iter()
            .filter(|(from, frame)| *from == node && frame.id.pgn() == pgn)
            .map(|(_, frame)| *frame)
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

/// [`CanDriver`] of one node on a [`SimNetwork`].
pub struct NodePort<'n> {
    net: &'n SimNetwork,
    node: usize,
}

impl CanDriver for NodePort<'_> {
    fn send_frame(&mut self, _port: u8, frame: &CanFrame) -> Result<TxHandle, SendStatus> {
        self.net.log.borrow_mut().push((self.node, *frame));
        if self.net.loss.get().is_some_and(|lost| lost(frame)) {
            return Ok(TxHandle(0));
        }
        for (index, inbox) in self.net.inboxes.borrow_mut().iter_mut().enumerate() {
            if index != self.node {
                inbox.push_back(*frame);
            }
        }
        Ok(TxHandle(0))
    }

    fn receive_frame(&mut self, _port: u8) -> Option<CanFrame> {
        self.net.inboxes.borrow_mut()[self.node].pop_front()
    }
}

pub type TestStack = Stack<8192, 16>;

/// A stack and its hooks.
pub struct Node {
    pub stack: TestStack,
    pub hooks: MemoryHooks,
}

impl Node {
    pub fn start(config: StackConfig) -> Self {
        let mut node = Self {
            stack: TestStack::new(config),
            hooks: MemoryHooks::default(),
        };
        node.stack.begin(&mut node.hooks).unwrap();
        node
    }

    pub fn address(&self) -> u8 {
        self.stack.address()
    }
}

/// Tick every node once per round, in index order.
pub fn run(net: &SimNetwork, nodes: &mut [Node], rounds: usize) {
    for _ in 0..rounds {
        for (index, node) in nodes.iter_mut().enumerate() {
            node.stack.tick(&mut net.port(index), &mut node.hooks);
        }
    }
}

/// Tick only the nodes listed in `which`; the others stay silent.
pub fn run_only(net: &SimNetwork, nodes: &mut [Node], which: &[usize], rounds: usize) {
    for _ in 0..rounds {
        for &index in which {
            let node = &mut nodes[index];
            node.stack.tick(&mut net.port(index), &mut node.hooks);
        }
    }
}

/// Run rounds until `done` holds, at most `max_rounds`. Returns whether it held.
pub fn run_until(
    net: &SimNetwork,
    nodes: &mut [Node],
    max_rounds: usize,
    done: impl Fn(&[Node]) -> bool,
) -> bool {
    for _ in 0..max_rounds {
        if done(nodes) {
            return true;
        }
        run(net, nodes, 1);
    }
    done(nodes)
}

pub fn all_online(nodes: &[Node]) -> bool {
    nodes.iter().all(|node| node.stack.is_online())
}
