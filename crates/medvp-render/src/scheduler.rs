//! Frame Scheduler
//!
//! Coalesces render requests into one host frame callback. The host owns
//! the actual per-frame hook (vsync, animation frame, redraw request): the
//! scheduler asks it for a frame through [`FrameHost`] and the host calls
//! back into the engine when the frame fires.

use crate::viewport::ViewportId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No frame callback registered
    Idle,
    /// Exactly one frame callback registered and not yet completed
    FramePending,
}

/// Host side of the per-frame callback
pub trait FrameHost {
    /// Register one frame callback
    fn request_frame(&mut self);

    /// Drop the registered callback, if any
    fn cancel_frame(&mut self);
}

/// Frame host that only counts calls.
///
/// Clones share counters, so a test or driver loop can keep one handle while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingFrameHost {
    requests: Arc<AtomicU64>,
    cancels: Arc<AtomicU64>,
}

impl RecordingFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn cancels(&self) -> u64 {
        self.cancels.load(Ordering::Relaxed)
    }
}

impl FrameHost for RecordingFrameHost {
    fn request_frame(&mut self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn cancel_frame(&mut self) {
        self.cancels.fetch_add(1, Ordering::Relaxed);
    }
}

/// Dirty set plus the Idle/FramePending state machine
pub struct FrameScheduler {
    state: SchedulerState,
    /// Insertion-ordered, no duplicates
    dirty: Vec<ViewportId>,
    host: Box<dyn FrameHost>,
    in_callback: bool,
    /// Work arrived while the callback was running
    rerequest: bool,
}

impl FrameScheduler {
    pub fn new(host: Box<dyn FrameHost>) -> Self {
        Self {
            state: SchedulerState::Idle,
            dirty: Vec::new(),
            host,
            in_callback: false,
            rerequest: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Whether a frame callback is registered or running
    pub fn frame_in_flight(&self) -> bool {
        self.state == SchedulerState::FramePending
    }

    /// Add a viewport to the dirty set and make sure a frame is coming.
    ///
    /// Returns true if this call registered the frame callback.
    pub fn mark_dirty(&mut self, id: &ViewportId) -> bool {
        if !self.dirty.contains(id) {
            self.dirty.push(id.clone());
        }
        self.ensure_frame()
    }

    /// Register a frame callback unless one is already pending.
    pub fn ensure_frame(&mut self) -> bool {
        match self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::FramePending;
                self.host.request_frame();
                trace!("Frame requested");
                true
            }
            SchedulerState::FramePending => {
                if self.in_callback {
                    self.rerequest = true;
                }
                false
            }
        }
    }

    /// Keep a viewport in the dirty set without asking for a frame.
    pub fn keep_dirty(&mut self, id: &ViewportId) {
        if !self.dirty.contains(id) {
            self.dirty.push(id.clone());
        }
    }

    pub fn is_dirty(&self, id: &ViewportId) -> bool {
        self.dirty.contains(id)
    }

    pub fn dirty(&self) -> &[ViewportId] {
        &self.dirty
    }

    /// Remove a viewport once it has rendered (or was disabled).
    pub fn clear(&mut self, id: &ViewportId) {
        self.dirty.retain(|other| other != id);
    }

    /// Start the frame callback; returns the viewports to render, in order.
    pub fn begin_frame(&mut self) -> Vec<ViewportId> {
        self.in_callback = true;
        self.rerequest = false;
        self.dirty.clone()
    }

    /// Finish the frame callback.
    ///
    /// Goes back to Idle; if new work was marked during the callback a fresh
    /// frame is requested right away.
    pub fn end_frame(&mut self) {
        self.in_callback = false;
        self.state = SchedulerState::Idle;
        if std::mem::take(&mut self.rerequest) {
            self.ensure_frame();
        }
    }

    /// Drop the pending callback, e.g. before a synchronous flush.
    pub fn cancel(&mut self) {
        if self.state == SchedulerState::FramePending && !self.in_callback {
            self.host.cancel_frame();
            self.state = SchedulerState::Idle;
            trace!("Frame cancelled");
        }
    }

    /// Forget all pending work.
    pub fn reset(&mut self) {
        self.cancel();
        self.dirty.clear();
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .finish()
    }
}
