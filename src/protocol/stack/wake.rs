//! Cross-context wake-up request for the tick loop.
use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};

/// Flag raised from an interrupt (or another task) to ask for an immediate tick.
///
/// The critical section only covers the read-and-clear, never the tick body.
pub struct WakeFlag<M: RawMutex> {
    inner: Mutex<M, Cell<bool>>,
}

impl<M: RawMutex> WakeFlag<M> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(false)),
        }
    }

    pub fn set(&self) {
        self.inner.lock(|flag| flag.set(true));
    }

    /// Read and clear.
    pub fn take(&self) -> bool {
        self.inner.lock(|flag| flag.replace(false))
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock(|flag| flag.get())
    }
}

impl<M: RawMutex> Default for WakeFlag<M> {
    fn default() -> Self {
        Self::new()
    }
}
