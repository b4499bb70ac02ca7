//! Roster of the remote nodes seen on the bus, keyed by NAME and by address.
//!
//! Every address claim heard from another node lands here. Entries count down and
//! are dropped when a node stays silent for the roster timeout; a claim from the
//! node refreshes its entry.
use crate::error::ClaimError;
use crate::protocol::managment::address_ranges::{device_function, is_dynamic};
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::transport::{GLOBAL_ADDRESS, NULL_ADDRESS};

/// Change reported for a remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeChange {
    /// First claim from this NAME.
    NewNode,
    /// A known NAME moved to another address.
    Address,
    /// The node lost its address to a higher-priority NAME.
    BumpedOff,
    /// The node stopped claiming and was dropped.
    TimedOut,
}

/// One remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RosterEntry {
    pub name: IsoName,
    pub address: u8,
    /// Ticks left before the entry expires.
    pub ticks: i32,
    /// Static default address the node was first seen on, if any.
    pub default_address: Option<u8>,
}

/// Fixed-capacity node roster.
pub struct Roster<const N: usize> {
    entries: [Option<RosterEntry>; N],
    timeout_ticks: i32,
}

impl<const N: usize> Roster<N> {
    pub const fn new(timeout_ticks: i32) -> Self {
        Self {
            entries: [None; N],
            timeout_ticks,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter().flatten()
    }

    pub fn find_by_name(&self, name: &IsoName) -> Option<&RosterEntry> {
        self.index_by_name(name).and_then(|i| self.entries[i].as_ref())
    }

    pub fn find_by_address(&self, address: u8) -> Option<&RosterEntry> {
        self.index_by_address(address)
            .and_then(|i| self.entries[i].as_ref())
    }

    /// A diagnostic terminal holds `address`.
    pub fn is_diagnostic_tool(&self, address: u8) -> bool {
        self.find_by_address(address)
            .is_some_and(|e| e.name.device_function() == device_function::DIAGNOSTIC_TERMINAL)
    }

    /// Record a claim of `address` by `name`.
    ///
    /// `notify` receives `(change, old_address, new_address, name)` for every node whose
    /// state changed. Claims from the null or global address, or with a null NAME, are ignored.
    pub fn record_claim<F>(
        &mut self,
        name: IsoName,
        address: u8,
        notify: &mut F,
    ) -> Result<(), ClaimError>
    where
        F: FnMut(NodeChange, u8, u8, IsoName),
    {
        if address == NULL_ADDRESS || address == GLOBAL_ADDRESS || name == IsoName::NULL {
            return Ok(());
        }

        let by_name = self.index_by_name(&name);
        let by_address = self.index_by_address(address);

        match (by_name, by_address) {
            (Some(n), Some(a)) if n == a => {
                self.refresh(n);
                Ok(())
            }
            (Some(n), _) => {
                self.process_claim(n, false, address, notify);
                Ok(())
            }
            _ => {
                let slot = self
                    .entries
                    .iter()
                    .position(Option::is_none)
                    .ok_or(ClaimError::NoRoom)?;
                self.entries[slot] = Some(RosterEntry {
                    name,
                    address: NULL_ADDRESS,
                    ticks: self.timeout_ticks,
                    default_address: None,
                });
                self.process_claim(slot, true, address, notify);
                Ok(())
            }
        }
    }

    /// Count every entry down by one tick, removing and handing out those that expire.
    pub fn tick<F>(&mut self, mut expired: F)
    where
        F: FnMut(RosterEntry),
    {
        for slot in self.entries.iter_mut() {
            let Some(entry) = slot.as_mut() else {
                continue;
            };
            entry.ticks -= 1;
            if entry.ticks <= 0 {
                let gone = *entry;
                *slot = None;
                #[cfg(feature = "defmt")]
                defmt::debug!("Node at {} timed out", gone.address);
                expired(gone);
            }
        }
    }

    /// Forget the node holding `address`.
    pub fn remove_address(&mut self, address: u8) -> Option<RosterEntry> {
        let index = self.index_by_address(address)?;
        self.entries[index].take()
    }

    fn process_claim<F>(&mut self, index: usize, is_new: bool, address: u8, notify: &mut F)
    where
        F: FnMut(NodeChange, u8, u8, IsoName),
    {
        let Some(claimer) = self.entries[index] else {
            return;
        };

        let occupant = self.index_by_address(address).filter(|&o| o != index);
        if let Some(occupant) = occupant {
            let Some(holder) = self.entries[occupant] else {
                return;
            };
            if holder.name.outranks(&claimer.name) {
                if is_new {
                    self.entries[index] = None;
                }
                return;
            }
            #[cfg(feature = "defmt")]
            defmt::info!("Node bumped off address {}", address);
            notify(NodeChange::BumpedOff, holder.address, GLOBAL_ADDRESS, holder.name);
            self.entries[occupant] = None;
        }

        let change = if is_new {
            NodeChange::NewNode
        } else {
            NodeChange::Address
        };
        let old = claimer.address;
        if let Some(entry) = self.entries[index].as_mut() {
            entry.address = address;
            if entry.default_address.is_none() && !is_dynamic(address) {
                entry.default_address = Some(address);
            }
        }
        self.refresh(index);
        notify(change, old, address, claimer.name);
    }

    fn refresh(&mut self, index: usize) {
        if let Some(entry) = self.entries[index].as_mut() {
            entry.ticks = self.timeout_ticks;
        }
    }

    fn index_by_name(&self, name: &IsoName) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_some_and(|e| e.name == *name))
    }

    fn index_by_address(&self, address: u8) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_some_and(|e| e.address == address))
    }
}
