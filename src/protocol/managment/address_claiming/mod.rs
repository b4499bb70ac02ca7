//! Tick-driven SAE J1939 / RV-C address-claim state machine.
//!
//! ```text
//!   Idle ─begin─► RandomDelay ─timer─► SendClaim ─► AwaitReplies ─250 ms─► Defend ─► Claimed
//!                      │                   ▲              │                 (StaticGlobal in the
//!                      │ static node       │ next addr    │ lost             RV-C diag variant)
//!                      └────► Defend       └── GiveUp ◄───┘
//!                                              │ range exhausted
//!                                              ▼
//!                   ExhaustedRange ─timer─► Retry ─► RetryWait ─request─► ExhaustedRange
//! ```
//!
//! A static node losing its address goes to `Blocked` and stays silent until the
//! winner disappears from the roster.
//!
//! The machine never touches the bus itself: every frame it wants on the wire goes
//! through [`ClaimContext`], and every wait is a countdown advanced by [`AddressClaimer::tick`].
use crate::error::ClaimError;
use crate::protocol::managment::address_ranges::{
    check_and_set_proper, check_proper, next_dynamic, preferred_address,
};
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::managment::roster::NodeChange;
use crate::protocol::messages::{AckReason, AckStatus};
use crate::protocol::transport::{ms_to_ticks, GLOBAL_ADDRESS, NULL_ADDRESS};

/// Time left to competing nodes to answer a claim (ms).
pub const CLAIM_TIMEOUT_MS: u32 = 250;
/// Upper bound (exclusive) of the random start-up delay (ms).
pub const RANDOM_DELAY_SPAN_MS: u32 = 154;

/// Claim states; discriminants are the values reported in [`ClaimError::BadState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClaimState {
    Idle = 0,
    RandomDelay = 1,
    SendClaim = 2,
    AwaitReplies = 3,
    GiveUp = 4,
    Claimed = 5,
    ExhaustedRange = 6,
    Retry = 7,
    RetryWait = 8,
    Defend = 9,
    StaticGlobal = 0x9A,
    Blocked = 10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    Random,
    Claim,
}

#[derive(Debug, Clone, Copy)]
struct ProtocolTimer {
    remaining: i32,
    action: TimerAction,
}

/// What the claimer needs from its surroundings.
pub trait ClaimContext {
    /// Queue an address claim carrying `name` from `source` to `destination`.
    fn send_claim(&mut self, name: IsoName, source: u8, destination: u8);

    /// Queue an ISO request for the address claim, sent from the null address.
    fn request_claim(&mut self, destination: u8);

    fn node_change(&mut self, _change: NodeChange, _old: u8, _new: u8, _name: IsoName) {}

    fn load_name(&mut self) -> Option<IsoName> {
        None
    }

    fn save_name(&mut self, _name: IsoName) {}

    fn load_address(&mut self) -> Option<u8> {
        None
    }

    fn save_address(&mut self, _address: u8) {}

    fn claim_error(&mut self, _error: ClaimError) {}
}

/// Local node identity and claim progress.
pub struct AddressClaimer {
    name: IsoName,
    address: u8,
    saved_address: u8,
    state: ClaimState,
    timer: Option<ProtocolTimer>,
    seed: u32,
    ms_per_tick: u32,
    rvc_diag: bool,
    refresh_period: Option<i32>,
    refresh_left: i32,
}

impl AddressClaimer {
    pub fn new(name: IsoName, ms_per_tick: u32, seed: u32) -> Self {
        Self {
            name,
            address: NULL_ADDRESS,
            saved_address: NULL_ADDRESS,
            state: ClaimState::Idle,
            timer: None,
            seed,
            ms_per_tick,
            rvc_diag: false,
            refresh_period: None,
            refresh_left: 0,
        }
    }

    /// Claim by requesting the holder of the address first, and confirm with a
    /// claim to address 0 (RV-C diagnostic variant).
    pub fn with_rvc_diag(mut self, enabled: bool) -> Self {
        self.rvc_diag = enabled;
        self
    }

    /// Re-broadcast the claim every `period_ms` once online.
    pub fn with_refresh(mut self, period_ms: Option<u32>) -> Self {
        self.refresh_period = period_ms.map(|ms| ms_to_ticks(ms, self.ms_per_tick).max(1));
        self.refresh_left = self.refresh_period.unwrap_or(0);
        self
    }

    pub fn name(&self) -> IsoName {
        self.name
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn saved_address(&self) -> u8 {
        self.saved_address
    }

    pub fn state(&self) -> ClaimState {
        self.state
    }

    /// The node holds an address and may send application traffic.
    pub fn on_line(&self) -> bool {
        self.state == ClaimState::Claimed
    }

    /// Start claiming.
    pub fn begin<C: ClaimContext>(&mut self, ctx: &mut C) -> Result<(), ClaimError> {
        if let Some(name) = ctx.load_name() {
            self.name = name;
        }
        if self.name.reserved() {
            return Err(ClaimError::ReservedBitSet);
        }

        self.address = preferred_address(&self.name, ctx.load_address());
        self.saved_address = self.address;
        #[cfg(feature = "defmt")]
        defmt::info!("Claiming, preferred address {}", self.address);

        self.start_timer(TimerAction::Random);
        self.state = ClaimState::RandomDelay;
        Ok(())
    }

    /// Advance the protocol timer by one tick.
    pub fn tick<C: ClaimContext>(&mut self, ctx: &mut C) {
        let Some(timer) = self.timer.as_mut() else {
            return;
        };
        if timer.remaining > 0 {
            timer.remaining -= 1;
        }
        if timer.remaining > 0 {
            return;
        }
        let action = timer.action;
        self.timer = None;

        match (action, self.state) {
            (TimerAction::Random, ClaimState::RandomDelay) => {
                if self.name.is_arbitrary_address_capable() {
                    self.enter(ClaimState::SendClaim, ctx);
                } else {
                    self.enter(ClaimState::Defend, ctx);
                }
            }
            (TimerAction::Random, ClaimState::ExhaustedRange) => {
                self.enter(ClaimState::Retry, ctx);
            }
            (TimerAction::Claim, ClaimState::AwaitReplies) => {
                self.saved_address = self.address;
                ctx.save_address(self.address);
                if self.rvc_diag {
                    self.enter(ClaimState::StaticGlobal, ctx);
                } else {
                    self.enter(ClaimState::Defend, ctx);
                }
            }
            (TimerAction::Claim, ClaimState::StaticGlobal) => {
                self.enter(ClaimState::Claimed, ctx);
            }
            (_, state) => ctx.claim_error(ClaimError::BadState { state: state as u8 }),
        }
    }

    /// Count down the periodic claim refresh; only runs while online.
    pub fn tick_refresh<C: ClaimContext>(&mut self, ctx: &mut C) {
        let Some(period) = self.refresh_period else {
            return;
        };
        if !self.on_line() {
            self.refresh_left = period;
            return;
        }
        self.refresh_left -= 1;
        if self.refresh_left <= 0 {
            self.refresh_left = period;
            ctx.send_claim(self.name, self.address, GLOBAL_ADDRESS);
        }
    }

    /// A claim for `source` carrying `their_name` was received.
    pub fn on_claim<C: ClaimContext>(&mut self, source: u8, their_name: IsoName, ctx: &mut C) {
        if source == NULL_ADDRESS || source == GLOBAL_ADDRESS || source != self.address {
            return;
        }
        if their_name == self.name {
            return;
        }
        let i_win = self.name.outranks(&their_name);
        #[cfg(feature = "defmt")]
        defmt::warn!("Address {} challenged, local NAME wins: {}", source, i_win);

        if !self.name.is_arbitrary_address_capable() {
            let next = if i_win {
                ClaimState::Defend
            } else {
                ClaimState::Blocked
            };
            self.enter(next, ctx);
            return;
        }

        match self.state {
            ClaimState::AwaitReplies => {
                if !i_win {
                    self.enter(ClaimState::GiveUp, ctx);
                } else if !self.rvc_diag {
                    self.enter(ClaimState::SendClaim, ctx);
                }
            }
            ClaimState::Claimed | ClaimState::StaticGlobal => {
                if i_win {
                    ctx.send_claim(self.name, self.address, GLOBAL_ADDRESS);
                } else {
                    self.enter(ClaimState::GiveUp, ctx);
                }
            }
            state => ctx.claim_error(ClaimError::BadState { state: state as u8 }),
        }
    }

    /// An ISO request for the address claim arrived from `requester`.
    pub fn on_request<C: ClaimContext>(&mut self, requester: u8, ctx: &mut C) {
        let reply_to = if requester == NULL_ADDRESS {
            GLOBAL_ADDRESS
        } else {
            requester
        };
        match self.state {
            ClaimState::SendClaim | ClaimState::AwaitReplies if !self.rvc_diag => {
                ctx.send_claim(self.name, self.address, reply_to);
            }
            ClaimState::Defend | ClaimState::StaticGlobal => {
                ctx.send_claim(self.name, self.address, reply_to);
            }
            ClaimState::Retry => ctx.send_claim(self.name, NULL_ADDRESS, reply_to),
            ClaimState::Claimed => self.enter(ClaimState::Defend, ctx),
            ClaimState::RetryWait => self.enter(ClaimState::ExhaustedRange, ctx),
            _ => {}
        }
    }

    /// Judge a commanded address addressed to `name`, asking for `new_address`.
    ///
    /// Returns the acknowledgment to send back, or `None` when the command is ignored.
    /// On `Ack` the caller moves with [`move_to`](Self::move_to) once the
    /// acknowledgment is queued.
    pub fn check_commanded_address(
        &self,
        name: IsoName,
        new_address: u8,
        from_diagnostic_tool: bool,
    ) -> Option<(AckStatus, AckReason)> {
        if name != self.name || !self.can_be_commanded() {
            return None;
        }
        if !from_diagnostic_tool {
            return Some((AckStatus::Deny, AckReason::Security));
        }
        if !check_proper(new_address) {
            return Some((AckStatus::Nak, AckReason::DataInvalid));
        }
        Some((AckStatus::Ack, AckReason::DoNotCare))
    }

    /// Adopt `new_address`, persist it and claim it.
    pub fn move_to<C: ClaimContext>(&mut self, new_address: u8, ctx: &mut C) {
        if new_address == self.address {
            return;
        }
        #[cfg(feature = "defmt")]
        defmt::info!("Commanded to address {}", new_address);
        self.address = new_address;
        self.saved_address = new_address;
        ctx.save_address(new_address);
        self.enter(ClaimState::SendClaim, ctx);
    }

    /// Adopt a new NAME and claim again from the current (validated) address.
    pub fn reload_name<C: ClaimContext>(&mut self, name: IsoName, ctx: &mut C) {
        self.name = name;
        ctx.save_name(name);
        self.address = check_and_set_proper(self.address);
        self.saved_address = self.address;
        ctx.save_address(self.address);
        self.enter(ClaimState::SendClaim, ctx);
    }

    /// The roster dropped the node at `address`; a blocked node retries its address.
    pub fn on_node_expired<C: ClaimContext>(&mut self, address: u8, ctx: &mut C) {
        if self.state != ClaimState::Blocked {
            return;
        }
        let preferred = preferred_address(&self.name, ctx.load_address());
        if preferred == address {
            self.address = preferred;
            self.start_timer(TimerAction::Random);
            self.state = ClaimState::RandomDelay;
        }
    }

    fn can_be_commanded(&self) -> bool {
        match self.state {
            ClaimState::Claimed | ClaimState::RetryWait | ClaimState::StaticGlobal => true,
            ClaimState::AwaitReplies => !self.rvc_diag,
            _ => false,
        }
    }

    /// Enter `state` and run its entry actions, following the transitions they imply.
    fn enter<C: ClaimContext>(&mut self, mut state: ClaimState, ctx: &mut C) {
        loop {
            self.state = state;
            let next = match state {
                ClaimState::SendClaim => {
                    if self.rvc_diag {
                        ctx.request_claim(self.address);
                    } else {
                        ctx.send_claim(self.name, self.address, GLOBAL_ADDRESS);
                    }
                    self.start_timer(TimerAction::Claim);
                    Some(ClaimState::AwaitReplies)
                }
                ClaimState::GiveUp => {
                    let next = next_dynamic(self.address, self.saved_address, &self.name);
                    if next == self.saved_address {
                        Some(ClaimState::ExhaustedRange)
                    } else {
                        self.address = next;
                        Some(ClaimState::SendClaim)
                    }
                }
                ClaimState::ExhaustedRange => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("No address left to claim");
                    self.address = NULL_ADDRESS;
                    self.start_timer(TimerAction::Random);
                    None
                }
                ClaimState::Retry => {
                    ctx.send_claim(self.name, NULL_ADDRESS, GLOBAL_ADDRESS);
                    Some(ClaimState::RetryWait)
                }
                ClaimState::Defend => {
                    ctx.send_claim(self.name, self.address, GLOBAL_ADDRESS);
                    Some(ClaimState::Claimed)
                }
                ClaimState::StaticGlobal => {
                    ctx.send_claim(self.name, self.address, 0);
                    self.start_timer(TimerAction::Claim);
                    None
                }
                ClaimState::Claimed => {
                    self.timer = None;
                    #[cfg(feature = "defmt")]
                    defmt::info!("Address {} claimed", self.address);
                    None
                }
                ClaimState::Blocked => {
                    self.timer = None;
                    None
                }
                _ => None,
            };
            match next {
                Some(next) => state = next,
                None => break,
            }
        }
    }

    fn start_timer(&mut self, action: TimerAction) {
        let ms = match action {
            TimerAction::Random => self.next_random_delay_ms(),
            TimerAction::Claim => CLAIM_TIMEOUT_MS,
        };
        self.timer = Some(ProtocolTimer {
            remaining: ms_to_ticks(ms, self.ms_per_tick),
            action,
        });
    }

    fn next_random_delay_ms(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.seed / 65_536) % RANDOM_DELAY_SPAN_MS
    }
}
