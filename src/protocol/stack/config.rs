//! Static configuration of a [`Stack`](super::Stack).
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::messages::PgnInfo;

/// Tuning of the frame pump and of the address claim.
///
/// ```rust
/// use korri_rvc::protocol::managment::iso_name::IsoName;
/// use korri_rvc::protocol::stack::StackConfig;
///
/// let config = StackConfig::new(IsoName::from_raw(0x8000_0000_0000_1234))
///     .with_ms_per_tick(5)
///     .with_claim_refresh_ms(Some(60_000));
/// assert_eq!(config.max_frames_per_cts, 16);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StackConfig {
    /// NAME claimed at start-up (a persisted NAME takes precedence).
    pub name: IsoName,
    pub ms_per_tick: u32,
    pub max_rx_frames_per_tick: u8,
    pub max_tx_frames_per_tick: u8,
    /// CAN ports served, numbered from 0.
    pub ports: u8,
    /// Window granted in our CTS, and announced in our RTS.
    pub max_frames_per_cts: u8,
    /// Silence after which a remote node leaves the roster.
    pub roster_timeout_ms: u32,
    /// Period of the claim refresh; `None` disables it.
    pub claim_refresh_ms: Option<u32>,
    /// Seed of the random claim delay; the NAME unique number when `None`.
    pub random_seed: Option<u32>,
    /// Use the RV-C diagnostic claim variant.
    pub rvc_diag_claim: bool,
    /// Application PGNs, looked up before the stack's own.
    pub pgn_table: &'static [PgnInfo],
}

impl StackConfig {
    pub const fn new(name: IsoName) -> Self {
        Self {
            name,
            ms_per_tick: 10,
            max_rx_frames_per_tick: 8,
            max_tx_frames_per_tick: 8,
            ports: 1,
            max_frames_per_cts: 16,
            roster_timeout_ms: 5000,
            claim_refresh_ms: None,
            random_seed: None,
            rvc_diag_claim: false,
            pgn_table: &[],
        }
    }

    pub const fn with_ms_per_tick(mut self, ms: u32) -> Self {
        self.ms_per_tick = ms;
        self
    }

    pub const fn with_max_rx_frames_per_tick(mut self, frames: u8) -> Self {
        self.max_rx_frames_per_tick = frames;
        self
    }

    pub const fn with_max_tx_frames_per_tick(mut self, frames: u8) -> Self {
        self.max_tx_frames_per_tick = frames;
        self
    }

    pub const fn with_ports(mut self, ports: u8) -> Self {
        self.ports = ports;
        self
    }

    pub const fn with_max_frames_per_cts(mut self, frames: u8) -> Self {
        self.max_frames_per_cts = frames;
        self
    }

    pub const fn with_roster_timeout_ms(mut self, ms: u32) -> Self {
        self.roster_timeout_ms = ms;
        self
    }

    pub const fn with_claim_refresh_ms(mut self, ms: Option<u32>) -> Self {
        self.claim_refresh_ms = ms;
        self
    }

    pub const fn with_random_seed(mut self, seed: u32) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub const fn with_rvc_diag_claim(mut self, enabled: bool) -> Self {
        self.rvc_diag_claim = enabled;
        self
    }

    pub const fn with_pgn_table(mut self, table: &'static [PgnInfo]) -> Self {
        self.pgn_table = table;
        self
    }

    pub(crate) fn seed(&self) -> u32 {
        self.random_seed.unwrap_or(self.name.unique_number())
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new(IsoName::NULL)
    }
}
