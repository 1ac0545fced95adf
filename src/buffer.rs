use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::document::Document;

/// Thread-safe accumulator of documents waiting to be flushed.
///
/// The threshold signal is edge triggered: [`Buffer::append`] reports the
/// crossing once, and is re-armed only by the next [`Buffer::drain`].
#[derive(Debug)]
pub struct Buffer {
    state: Mutex<State>,
    max_size: usize,
}

#[derive(Debug)]
struct State {
    docs: Vec<Document>,
    signalled: bool,
}

impl Buffer {
    pub fn new(max_size: usize) -> Self {
        Buffer {
            state: Mutex::new(State {
                docs: Vec::with_capacity(max_size.min(4096)),
                signalled: false,
            }),
            max_size: max_size.max(1),
        }
    }

    /// Add a document. Returns `true` if this append made the buffer reach
    /// `max_size` for the first time since the last drain.
    pub fn append(&self, doc: Document) -> bool {
        let mut state = self.lock();
        state.docs.push(doc);
        if !state.signalled && state.docs.len() >= self.max_size {
            state.signalled = true;
            return true;
        }
        false
    }

    /// Take every pending document, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Document> {
        let mut state = self.lock();
        state.signalled = false;
        std::mem::take(&mut state.docs)
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // A panic while holding the lock cannot leave `State` half updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
