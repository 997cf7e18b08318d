//! Fixtures shared by the unit tests

use parking_lot::Mutex;
use std::sync::Arc;

/// Whether two handles point at the same object, regardless of the view type
pub(crate) fn same_object<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Ordered record of lifecycle events, managed like any other component
#[derive(Default)]
pub(crate) struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}
