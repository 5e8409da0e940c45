//! Coalesces change notifications into one flush per frame.

use crate::store::ChangeCallback;
use indexmap::IndexSet;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type FrameRequester = Rc<dyn Fn()>;

#[derive(Default)]
struct Shared {
    pending: RefCell<IndexSet<String>>,
    scheduled: Cell<bool>,
    requester: RefCell<Option<FrameRequester>>,
    frames_requested: Cell<u64>,
}

/// Outcome of one [`crate::Engine::flush`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Changed paths handled by this flush, in notification order.
    pub affected_paths: Vec<String>,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct Scheduler {
    shared: Rc<Shared>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback for the store. The first change after a flush asks the host
    /// for a frame; later ones only join the pending set.
    pub fn notifier(&self) -> ChangeCallback {
        let shared = self.shared.clone();
        Rc::new(move |path: &str| {
            shared.pending.borrow_mut().insert(path.to_string());
            if shared.scheduled.replace(true) {
                return;
            }
            shared.frames_requested.set(shared.frames_requested.get() + 1);
            log::debug!(target: "vortex", "flush scheduled by change at '{path}'");
            let requester = shared.requester.borrow().clone();
            if let Some(requester) = requester {
                requester();
            }
        })
    }

    pub fn set_frame_requester(&self, requester: FrameRequester) {
        *self.shared.requester.borrow_mut() = Some(requester);
    }

    pub fn is_scheduled(&self) -> bool {
        self.shared.scheduled.get()
    }

    /// How many times a frame has been requested so far.
    pub fn frames_requested(&self) -> u64 {
        self.shared.frames_requested.get()
    }

    pub fn pending(&self) -> Vec<String> {
        self.shared.pending.borrow().iter().cloned().collect()
    }

    /// Captures and clears the pending set. Changes made after this call
    /// schedule a new frame.
    pub fn take_pending(&self) -> IndexSet<String> {
        self.shared.scheduled.set(false);
        std::mem::take(&mut *self.shared.pending.borrow_mut())
    }

    pub fn clear(&self) {
        self.take_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_frame_per_window() {
        let scheduler = Scheduler::new();
        let frames = Rc::new(Cell::new(0));
        let counter = frames.clone();
        scheduler.set_frame_requester(Rc::new(move || counter.set(counter.get() + 1)));

        let notify = scheduler.notifier();
        notify("count");
        notify("user.name");
        notify("count");
        assert!(scheduler.is_scheduled());
        assert_eq!(frames.get(), 1);
        assert_eq!(scheduler.pending(), vec!["count", "user.name"]);

        let taken = scheduler.take_pending();
        assert_eq!(taken.len(), 2);
        assert!(!scheduler.is_scheduled());
        assert!(scheduler.pending().is_empty());

        notify("count");
        assert_eq!(frames.get(), 2);
        assert_eq!(scheduler.frames_requested(), 2);
    }
}
