//! Frame listener bookkeeping shared by the mock sources

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{Frame, FrameCallback, ListenerId};

/// Registered frame callbacks of one source
///
/// Once closed, the set refuses new callbacks until reopened: they are
/// dropped on registration, so late listeners see the source as ended.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    closed: AtomicBool,
    callbacks: Mutex<HashMap<ListenerId, FrameCallback>>,
}

impl ListenerSet {
    pub(crate) fn add(&self, callback: FrameCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut callbacks = lock(&self.callbacks);
        // checked under the lock so a concurrent close cannot miss it
        if !self.closed.load(Ordering::SeqCst) {
            callbacks.insert(id, callback);
        }
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) {
        lock(&self.callbacks).remove(&id);
    }

    /// Drop every callback, which tells listeners the source has ended
    pub(crate) fn close(&self) {
        let mut callbacks = lock(&self.callbacks);
        self.closed.store(true, Ordering::SeqCst);
        callbacks.clear();
    }

    /// Accept callbacks again after `close`
    pub(crate) fn reopen(&self) {
        let _callbacks = lock(&self.callbacks);
        self.closed.store(false, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.callbacks).len()
    }

    /// Deliver a frame to every listener
    ///
    /// Callbacks run outside the lock so they may (un)register listeners.
    pub(crate) fn notify(&self, frame: &Frame) {
        let callbacks: Vec<FrameCallback> = lock(&self.callbacks).values().cloned().collect();
        for callback in callbacks {
            callback(frame.clone());
        }
    }
}

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
