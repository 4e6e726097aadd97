// crates/confstack-core/src/runtime/memory_cache.rs
// ============================================================================
// Module: Local Memory Cache Clock
// Description: Process-wide expiration clock coordinating per-provider caches.
// Purpose: Expire every provider's in-process cache in one logical operation.
// Dependencies: parking_lot
// ============================================================================

//! ## Overview
//! Every provider keeps an in-process cache of the directories it has
//! bulk-fetched. Those caches share a single expiration clock so they all
//! re-synchronize together: if they drifted independently, a provider whose
//! cache outlived the distributed cache could keep serving a value that the
//! fresher source no longer has.
//!
//! The clock hands out a monotonically increasing epoch. [`EpochCell`] slots
//! stamp their contents with the epoch they were filled in; a stale stamp
//! discards the contents before the caller sees them, so expiration is one
//! atomic epoch bump rather than a per-key sweep. Fillers build replacement
//! state fully and swap it in under the write lock, so readers never observe
//! a partially repopulated cache. Concurrent fillers racing after a reset are
//! benign: last write wins and values are idempotent for a given snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use parking_lot::RwLock;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Shared expiration clock for all per-provider in-process caches.
///
/// # Invariants
/// - The epoch only ever increases.
/// - A zero window disables time-based expiration (explicit resets still work).
#[derive(Debug)]
pub struct LocalMemoryCache {
    /// How long an epoch stays valid before lookups start a new one.
    window: Duration,
    /// Current epoch and the instant it started.
    state: Mutex<ClockState>,
}

/// Mutable clock state guarded by the mutex.
#[derive(Debug)]
struct ClockState {
    /// Monotonically increasing cache generation.
    epoch: u64,
    /// Instant the current epoch began.
    started: Instant,
}

impl LocalMemoryCache {
    /// Default expiration window.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

    /// Creates a clock with the given expiration window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(ClockState {
                epoch: 0,
                started: Instant::now(),
            }),
        }
    }

    /// Returns the current epoch, starting a new one when the window elapsed.
    #[must_use]
    pub fn current_epoch(&self) -> u64 {
        let mut state = self.state.lock();
        if !self.window.is_zero() && state.started.elapsed() >= self.window {
            state.epoch += 1;
            state.started = Instant::now();
        }
        state.epoch
    }

    /// Invalidates every dependent cache by starting a new epoch immediately.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.started = Instant::now();
    }

    /// Returns the configured expiration window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl Default for LocalMemoryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

// ============================================================================
// SECTION: Epoch Cell
// ============================================================================

/// Per-provider cache slot coordinated by the shared clock.
///
/// # Invariants
/// - Contents stamped with an older epoch are replaced with `T::default()`
///   before any access; callers never see stale state.
#[derive(Debug)]
pub struct EpochCell<T> {
    /// The shared clock this slot is coordinated by.
    clock: Arc<LocalMemoryCache>,
    /// Epoch-stamped contents.
    slot: RwLock<Slot<T>>,
}

/// Epoch-stamped contents of a cell.
#[derive(Debug)]
struct Slot<T> {
    /// Epoch the value was filled in.
    epoch: u64,
    /// The cached state.
    value: T,
}

impl<T: Default> EpochCell<T> {
    /// Creates an empty cell bound to the shared clock.
    #[must_use]
    pub fn new(clock: Arc<LocalMemoryCache>) -> Self {
        Self {
            clock,
            slot: RwLock::new(Slot {
                epoch: 0,
                value: T::default(),
            }),
        }
    }

    /// Runs `read` against the current-epoch contents.
    pub fn read<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        let epoch = self.clock.current_epoch();
        {
            let slot = self.slot.read();
            if slot.epoch == epoch {
                return read(&slot.value);
            }
        }
        let mut slot = self.slot.write();
        if slot.epoch != epoch {
            *slot = Slot {
                epoch,
                value: T::default(),
            };
        }
        read(&slot.value)
    }

    /// Runs `write` against the current-epoch contents with mutable access.
    pub fn write<R>(&self, write: impl FnOnce(&mut T) -> R) -> R {
        let epoch = self.clock.current_epoch();
        let mut slot = self.slot.write();
        if slot.epoch != epoch {
            *slot = Slot {
                epoch,
                value: T::default(),
            };
        }
        write(&mut slot.value)
    }
}
