//! Animation-frame and timer scheduling.
//!
//! The host owns the real event loop. The engine only asks a [`FrameScheduler`]
//! for frame callbacks and timers, then gets called back through the chart with
//! the handle it was given. [`FrameSlot`] keeps at most one frame pending.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::PanelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

/// Host services the engine defers work to.
pub trait FrameScheduler {
    /// Asks for one callback on the next animation frame.
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
    /// Asks for one callback after `delay`.
    fn set_timer(&mut self, delay: Duration) -> TimerHandle;
    fn cancel_timer(&mut self, handle: TimerHandle);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    /// Some panels (possibly none, for an overlay-only redraw) await a re-render.
    PartialScheduled {
        handle: FrameHandle,
        panels: Vec<PanelId>,
    },
    /// Every panel re-renders and the time grid is recomputed.
    FullScheduled { handle: FrameHandle },
}

/// What a fired frame has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFlush {
    Partial(Vec<PanelId>),
    Full,
}

/// Single pending-frame slot.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    state: FrameState,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == FrameState::Idle
    }

    /// Queues `panel` (or only the overlay when `None`) for the next frame.
    ///
    /// Repeated ids are coalesced. Ignored while a full render is pending.
    pub fn request_partial<S: FrameScheduler + ?Sized>(
        &mut self,
        scheduler: &mut S,
        panel: Option<PanelId>,
    ) {
        match &mut self.state {
            FrameState::FullScheduled { .. } => {}
            FrameState::PartialScheduled { panels, .. } => {
                if let Some(panel) = panel {
                    if !panels.contains(&panel) {
                        panels.push(panel);
                    }
                }
            }
            FrameState::Idle => {
                self.state = FrameState::PartialScheduled {
                    handle: scheduler.request_frame(),
                    panels: panel.into_iter().collect(),
                };
            }
        }
    }

    /// Schedules a full render, replacing any pending partial one.
    pub fn request_full<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        match self.state {
            FrameState::FullScheduled { .. } => {}
            FrameState::PartialScheduled { handle, .. } => {
                scheduler.cancel_frame(handle);
                self.state = FrameState::FullScheduled {
                    handle: scheduler.request_frame(),
                };
            }
            FrameState::Idle => {
                self.state = FrameState::FullScheduled {
                    handle: scheduler.request_frame(),
                };
            }
        }
    }

    /// Drops a pending partial frame. A pending full frame is kept.
    pub fn cancel_partial<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let FrameState::PartialScheduled { handle, .. } = self.state {
            scheduler.cancel_frame(handle);
            self.state = FrameState::Idle;
        }
    }

    /// Consumes the pending frame if `handle` is the one it waits for.
    ///
    /// Stale handles, e.g. of a cancelled frame the host fired anyway, yield
    /// `None` and leave the slot untouched.
    pub fn take(&mut self, handle: FrameHandle) -> Option<FrameFlush> {
        let pending = match &self.state {
            FrameState::Idle => return None,
            FrameState::PartialScheduled { handle: pending, .. }
            | FrameState::FullScheduled { handle: pending } => *pending,
        };
        if pending != handle {
            return None;
        }

        match std::mem::take(&mut self.state) {
            FrameState::PartialScheduled { panels, .. } => Some(FrameFlush::Partial(panels)),
            FrameState::FullScheduled { .. } => Some(FrameFlush::Full),
            FrameState::Idle => None,
        }
    }
}

/// Scheduler driven by hand, for tests and offline rendering.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_handle: u64,
    now: Duration,
    frames: Vec<FrameHandle>,
    timers: Vec<(TimerHandle, Duration)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Pops the oldest requested frame.
    pub fn take_frame(&mut self) -> Option<FrameHandle> {
        if self.frames.is_empty() {
            None
        } else {
            Some(self.frames.remove(0))
        }
    }

    /// Moves the clock forward and returns the timers that fired, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerHandle> {
        self.now += by;
        let now = self.now;

        let mut fired: Vec<(TimerHandle, Duration)> = Vec::new();
        self.timers.retain(|&(handle, deadline)| {
            if deadline <= now {
                fired.push((handle, deadline));
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|&(handle, deadline)| (deadline, handle));
        fired.into_iter().map(|(handle, _)| handle).collect()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next());
        self.frames.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.frames.retain(|&pending| pending != handle);
    }

    fn set_timer(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next());
        self.timers.push((handle, self.now + delay));
        handle
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        self.timers.retain(|&(pending, _)| pending != handle);
    }
}
