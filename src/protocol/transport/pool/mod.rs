//! Fixed-capacity pools of transfer objects.
//!
//! Each pool is an index arena with two intrusive doubly-linked chains, `free` and
//! `used`. A node is on exactly one of them. Keys carry a generation so a key kept
//! after its DOB was released cannot reach the next occupant of the slot.
use crate::error::PoolError;
use crate::protocol::transport::dob::Dob;

/// Slots of the normal pool.
pub const NORMAL_POOL_CAPACITY: usize = 40;
/// Slots of the high-priority pool (claims, acknowledgements, TP.CM control).
pub const VIP_POOL_CAPACITY: usize = 10;

const NIL: u16 = u16::MAX;

/// Which pool a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PoolKind {
    Normal,
    Vip,
}

/// Handle on a live DOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DobKey {
    pub pool: PoolKind,
    pub index: u16,
    pub generation: u16,
}

#[derive(Debug, Clone)]
struct Node {
    dob: Option<Dob>,
    prev: u16,
    next: u16,
    generation: u16,
}

#[derive(Debug, Clone, Copy)]
struct Chain {
    head: u16,
    tail: u16,
    count: u16,
}

impl Chain {
    const EMPTY: Chain = Chain {
        head: NIL,
        tail: NIL,
        count: 0,
    };
}

/// Pool of `N` transfer objects.
#[derive(Debug, Clone)]
pub struct Pool<const N: usize> {
    kind: PoolKind,
    nodes: [Node; N],
    free: Chain,
    used: Chain,
    max_used: u16,
}

impl<const N: usize> Pool<N> {
    pub fn new(kind: PoolKind) -> Self {
        let mut pool = Self {
            kind,
            nodes: core::array::from_fn(|_| Node {
                dob: None,
                prev: NIL,
                next: NIL,
                generation: 0,
            }),
            free: Chain::EMPTY,
            used: Chain::EMPTY,
            max_used: 0,
        };
        for index in 0..N as u16 {
            Self::push_back(&mut pool.nodes, &mut pool.free, index);
        }
        pool
    }

    /// Store `dob` in the oldest free slot and append it to the used chain.
    pub fn acquire(&mut self, mut dob: Dob) -> Result<DobKey, PoolError> {
        let index = self.free.head;
        if index == NIL {
            #[cfg(feature = "defmt")]
            defmt::warn!("{} pool full", self.kind);
            return Err(PoolError::Full { capacity: N });
        }
        Self::unlink(&mut self.nodes, &mut self.free, index);
        Self::push_back(&mut self.nodes, &mut self.used, index);

        dob.slot = Some(index);
        let node = &mut self.nodes[index as usize];
        node.dob = Some(dob);
        let generation = node.generation;
        self.max_used = self.max_used.max(self.used.count);
        self.check();

        Ok(DobKey {
            pool: self.kind,
            index,
            generation,
        })
    }

    /// Take the DOB out of its slot and return the slot to the free chain.
    pub fn release(&mut self, key: DobKey) -> Option<Dob> {
        if !self.is_live(key) {
            return None;
        }
        let index = key.index;
        Self::unlink(&mut self.nodes, &mut self.used, index);
        Self::push_back(&mut self.nodes, &mut self.free, index);

        let node = &mut self.nodes[index as usize];
        node.generation = node.generation.wrapping_add(1);
        let mut dob = node.dob.take();
        if let Some(dob) = dob.as_mut() {
            dob.slot = None;
        }
        self.check();
        dob
    }

    pub fn get(&self, key: DobKey) -> Option<&Dob> {
        if !self.is_live(key) {
            return None;
        }
        self.nodes[key.index as usize].dob.as_ref()
    }

    pub fn get_mut(&mut self, key: DobKey) -> Option<&mut Dob> {
        if !self.is_live(key) {
            return None;
        }
        self.nodes[key.index as usize].dob.as_mut()
    }

    /// Oldest DOB in the pool.
    pub fn first_used(&self) -> Option<DobKey> {
        self.key_at(self.used.head)
    }

    /// DOB queued after `key`, oldest first.
    pub fn next_used(&self, key: DobKey) -> Option<DobKey> {
        if !self.is_live(key) {
            return None;
        }
        self.key_at(self.nodes[key.index as usize].next)
    }

    /// First live DOB for which `predicate` holds, oldest first.
    pub fn find(&self, mut predicate: impl FnMut(&Dob) -> bool) -> Option<DobKey> {
        let mut cursor = self.first_used();
        while let Some(key) = cursor {
            if self.get(key).is_some_and(&mut predicate) {
                return Some(key);
            }
            cursor = self.next_used(key);
        }
        None
    }

    #[inline]
    pub fn used_count(&self) -> usize {
        self.used.count as usize
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.count as usize
    }

    /// High-water mark of the used chain.
    #[inline]
    pub fn max_used(&self) -> usize {
        self.max_used as usize
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    fn is_live(&self, key: DobKey) -> bool {
        key.pool == self.kind
            && (key.index as usize) < N
            && self.nodes[key.index as usize].generation == key.generation
            && self.nodes[key.index as usize].dob.is_some()
    }

    fn key_at(&self, index: u16) -> Option<DobKey> {
        if index == NIL {
            return None;
        }
        Some(DobKey {
            pool: self.kind,
            index,
            generation: self.nodes[index as usize].generation,
        })
    }

    fn push_back(nodes: &mut [Node; N], chain: &mut Chain, index: u16) {
        let tail = chain.tail;
        {
            let node = &mut nodes[index as usize];
            node.prev = tail;
            node.next = NIL;
        }
        if tail == NIL {
            chain.head = index;
        } else {
            nodes[tail as usize].next = index;
        }
        chain.tail = index;
        chain.count += 1;
    }

    /// Splice `index` out of `chain`, whether it is the head, the tail, alone or inside.
    fn unlink(nodes: &mut [Node; N], chain: &mut Chain, index: u16) {
        let (prev, next) = {
            let node = &nodes[index as usize];
            (node.prev, node.next)
        };
        if prev == NIL {
            chain.head = next;
        } else {
            nodes[prev as usize].next = next;
        }
        if next == NIL {
            chain.tail = prev;
        } else {
            nodes[next as usize].prev = prev;
        }
        let node = &mut nodes[index as usize];
        node.prev = NIL;
        node.next = NIL;
        chain.count -= 1;
    }

    #[inline]
    fn check(&self) {
        debug_assert_eq!(self.used.count as usize + self.free.count as usize, N);
    }
}
