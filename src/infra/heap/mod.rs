//! Bounded first-fit heap backing transfer payloads.
//!
//! The arena is cut into 8-byte units. Every block starts with a one-unit header:
//!
//! ```text
//! byte 0    : in-use flag (0 = free, 1 = used)
//! bytes 2-3 : next free block (unit index, little-endian, 0xFFFF = end of list)
//! bytes 4-5 : block size in units, header included
//! ```
//!
//! Free blocks form a singly linked list sorted by address; releases coalesce with
//! both neighbours so the list never holds two contiguous entries.
use crate::error::HeapError;

/// Size of one allocation unit (and of a block header).
pub const UNIT_BYTES: usize = 8;
/// Allocations are rounded up to this many units to limit fragmentation.
pub const BLOCK_QUANTUM: u16 = 4;

const FREE: u8 = 0;
const USED: u8 = 1;
const END: u16 = u16::MAX;

/// Reference to a live allocation. Plain value: copying it does not duplicate the
/// memory, releasing it twice is reported as corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeapHandle {
    /// Unit index of the block header.
    pub unit: u16,
    /// Requested length in bytes.
    pub len: u16,
}

impl HeapHandle {
    /// Byte offset of the payload inside the arena.
    #[inline]
    pub fn offset(&self) -> usize {
        (self.unit as usize + 1) * UNIT_BYTES
    }
}

/// Usage counters exported by [`Heap::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeapStats {
    pub free_bytes: usize,
    /// Low-water mark of `free_bytes`.
    pub min_free_bytes: usize,
    pub alloc_count: u32,
    pub free_count: u32,
    pub malloc_fail: u32,
    pub corruption: u32,
}

/// Fixed-size allocator over an owned byte array.
pub struct Heap<const BYTES: usize> {
    arena: [u8; BYTES],
    free_head: u16,
    used_units: u16,
    stats: HeapStats,
}

impl<const BYTES: usize> Default for Heap<BYTES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BYTES: usize> Heap<BYTES> {
    /// Total number of units in the arena.
    const UNITS: u16 = {
        let units = BYTES / UNIT_BYTES;
        if units > (END - 1) as usize {
            END - 1
        } else {
            units as u16
        }
    };

    /// Build an empty heap: one free block spanning the whole arena.
    pub fn new() -> Self {
        let mut heap = Self {
            arena: [0; BYTES],
            free_head: END,
            used_units: 0,
            stats: HeapStats {
                free_bytes: Self::UNITS as usize * UNIT_BYTES,
                min_free_bytes: Self::UNITS as usize * UNIT_BYTES,
                alloc_count: 0,
                free_count: 0,
                malloc_fail: 0,
                corruption: 0,
            },
        };
        if Self::UNITS > 0 {
            heap.write_header(0, false, END, Self::UNITS);
            heap.free_head = 0;
        }
        heap
    }

    //==================================================================================HEADER_ACCESS

    #[inline]
    fn base(unit: u16) -> usize {
        unit as usize * UNIT_BYTES
    }

    fn in_use(&self, unit: u16) -> bool {
        self.arena[Self::base(unit)] == USED
    }

    fn next(&self, unit: u16) -> u16 {
        let b = Self::base(unit);
        u16::from_le_bytes([self.arena[b + 2], self.arena[b + 3]])
    }

    fn size(&self, unit: u16) -> u16 {
        let b = Self::base(unit);
        u16::from_le_bytes([self.arena[b + 4], self.arena[b + 5]])
    }

    fn write_header(&mut self, unit: u16, in_use: bool, next: u16, size: u16) {
        let b = Self::base(unit);
        self.arena[b] = if in_use { USED } else { FREE };
        self.arena[b + 1] = 0;
        self.arena[b + 2..b + 4].copy_from_slice(&next.to_le_bytes());
        self.arena[b + 4..b + 6].copy_from_slice(&size.to_le_bytes());
    }

    fn set_next(&mut self, unit: u16, next: u16) {
        let b = Self::base(unit);
        self.arena[b + 2..b + 4].copy_from_slice(&next.to_le_bytes());
    }

    fn set_size(&mut self, unit: u16, size: u16) {
        let b = Self::base(unit);
        self.arena[b + 4..b + 6].copy_from_slice(&size.to_le_bytes());
    }

    //==================================================================================ALLOCATION

    /// Units needed for `size` payload bytes, header included, rounded to the quantum.
    pub fn units_for(size: usize) -> usize {
        let units = size.div_ceil(UNIT_BYTES) + 1;
        units.div_ceil(BLOCK_QUANTUM as usize) * BLOCK_QUANTUM as usize
    }

    /// Allocate `size` bytes with a first-fit scan of the free list.
    pub fn allocate(&mut self, size: usize) -> Result<HeapHandle, HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }
        let units = Self::units_for(size);
        if units > Self::UNITS as usize || size > u16::MAX as usize {
            return Err(self.exhausted(size));
        }
        let units = units as u16;

        let mut prev = END;
        let mut cursor = self.free_head;
        while cursor != END {
            let block_size = self.size(cursor);
            if block_size >= units {
                let next = self.next(cursor);
                // Split only when the remainder is worth keeping
                let (taken, follower) = if block_size - units > BLOCK_QUANTUM {
                    let rest = cursor + units;
                    self.write_header(rest, false, next, block_size - units);
                    (units, rest)
                } else {
                    (block_size, next)
                };

                if prev == END {
                    self.free_head = follower;
                } else {
                    self.set_next(prev, follower);
                }
                self.write_header(cursor, true, END, taken);

                self.used_units += taken;
                self.stats.alloc_count += 1;
                self.refresh_free();
                return Ok(HeapHandle {
                    unit: cursor,
                    len: size as u16,
                });
            }
            prev = cursor;
            cursor = self.next(cursor);
        }

        Err(self.exhausted(size))
    }

    fn exhausted(&mut self, size: usize) -> HeapError {
        self.stats.malloc_fail += 1;
        #[cfg(feature = "defmt")]
        defmt::warn!("heap exhausted: {} bytes asked", size);
        HeapError::OutOfMemory {
            asked: size,
            free: self.stats.free_bytes,
        }
    }

    /// Return a block to the free list, merging it with contiguous free neighbours.
    ///
    /// A block that is already free, out of range, or overlapping a free block is left
    /// untouched and reported as [`HeapError::Corrupted`].
    pub fn release(&mut self, handle: HeapHandle) -> Result<(), HeapError> {
        let unit = handle.unit;
        if unit >= Self::UNITS || !self.in_use(unit) {
            return Err(self.corrupted(unit));
        }
        let size = self.size(unit);
        let end = unit as u32 + size as u32;
        if size == 0 || end > Self::UNITS as u32 {
            return Err(self.corrupted(unit));
        }

        // Address-ordered insertion point
        let mut prev = END;
        let mut next = self.free_head;
        while next != END && next < unit {
            prev = next;
            next = self.next(next);
        }

        if next != END && end > next as u32 {
            return Err(self.corrupted(unit));
        }
        if prev != END && prev as u32 + self.size(prev) as u32 > unit as u32 {
            return Err(self.corrupted(unit));
        }

        self.used_units -= size;
        self.stats.free_count += 1;

        // Merge with the follower
        if next != END && end == next as u32 {
            let merged = size + self.size(next);
            let after = self.next(next);
            self.write_header(unit, false, after, merged);
        } else {
            self.write_header(unit, false, next, size);
        }

        // Merge with the predecessor
        if prev == END {
            self.free_head = unit;
        } else if prev as u32 + self.size(prev) as u32 == unit as u32 {
            let merged = self.size(prev) + self.size(unit);
            let after = self.next(unit);
            self.set_size(prev, merged);
            self.set_next(prev, after);
        } else {
            self.set_next(prev, unit);
        }

        self.refresh_free();
        Ok(())
    }

    fn corrupted(&mut self, unit: u16) -> HeapError {
        self.stats.corruption += 1;
        #[cfg(feature = "defmt")]
        defmt::warn!("heap corruption at unit {}", unit);
        HeapError::Corrupted { unit }
    }

    fn refresh_free(&mut self) {
        let free = (Self::UNITS - self.used_units) as usize * UNIT_BYTES;
        self.stats.free_bytes = free;
        if free < self.stats.min_free_bytes {
            self.stats.min_free_bytes = free;
        }
    }

    //==================================================================================DATA_ACCESS

    /// Payload bytes of a live allocation.
    pub fn bytes(&self, handle: HeapHandle) -> &[u8] {
        let start = handle.offset().min(BYTES);
        let end = (start + handle.len as usize).min(BYTES);
        &self.arena[start..end]
    }

    /// Mutable payload bytes of a live allocation.
    pub fn bytes_mut(&mut self, handle: HeapHandle) -> &mut [u8] {
        let start = handle.offset().min(BYTES);
        let end = (start + handle.len as usize).min(BYTES);
        &mut self.arena[start..end]
    }

    /// Current counters.
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Bytes currently free, headers of free blocks included.
    pub fn free_bytes(&self) -> usize {
        self.stats.free_bytes
    }

    /// Arena size in bytes, rounded down to whole units.
    pub fn capacity(&self) -> usize {
        Self::UNITS as usize * UNIT_BYTES
    }

    /// Walk the free list and return `(blocks, units)`.
    pub fn free_list_summary(&self) -> (usize, usize) {
        let mut blocks = 0;
        let mut units = 0;
        let mut cursor = self.free_head;
        while cursor != END && blocks <= Self::UNITS as usize {
            blocks += 1;
            units += self.size(cursor) as usize;
            cursor = self.next(cursor);
        }
        (blocks, units)
    }
}
