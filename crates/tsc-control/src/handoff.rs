//! Lock-light handoffs between a controller and the loops around it.
//!
//! | Type              | Writer                 | Reader            |
//! |-------------------|------------------------|-------------------|
//! | `ObservationSlot` | detection / ingestion  | controller tick   |
//! | `OffsetCell`      | network coordinator    | controller tick   |
//!
//! Neither side ever blocks on the other for longer than one `Option` swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tsc_core::ObservationFrame;

// ── ObservationSlot ───────────────────────────────────────────────────────────

/// Single-slot "latest observation" mailbox.
///
/// `publish` overwrites whatever is waiting; the controller `take`s at most
/// one frame per tick and reuses its previous frame when the slot is empty.
#[derive(Clone, Debug, Default)]
pub struct ObservationSlot(Arc<Mutex<Option<ObservationFrame>>>);

impl ObservationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the waiting frame.  Returns `true` if an unread frame was dropped.
    pub fn publish(&self, frame: ObservationFrame) -> bool {
        self.0.lock().replace(frame).is_some()
    }

    pub fn take(&self) -> Option<ObservationFrame> {
        self.0.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_none()
    }
}

// ── OffsetCell ────────────────────────────────────────────────────────────────

/// Phase-start offset written by the coordinator, read by one controller.
#[derive(Debug)]
pub struct OffsetCell {
    nanos: AtomicU64,
}

impl OffsetCell {
    const UNSET: u64 = u64::MAX;

    pub fn new() -> Arc<Self> {
        Arc::new(Self { nanos: AtomicU64::new(Self::UNSET) })
    }

    pub fn set(&self, offset: Duration) {
        let n = u64::try_from(offset.as_nanos()).unwrap_or(Self::UNSET - 1);
        self.nanos.store(n, Ordering::Release);
    }

    pub fn clear(&self) {
        self.nanos.store(Self::UNSET, Ordering::Release);
    }

    pub fn get(&self) -> Option<Duration> {
        match self.nanos.load(Ordering::Acquire) {
            Self::UNSET => None,
            n => Some(Duration::from_nanos(n)),
        }
    }
}

impl Default for OffsetCell {
    fn default() -> Self {
        Self { nanos: AtomicU64::new(Self::UNSET) }
    }
}
