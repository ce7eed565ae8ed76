//! Shared work queue for the download stage.
//!
//! The whole batch is known up front, so the queue is seeded once and only
//! ever shrinks. Claims never block: a worker that finds the queue empty
//! simply exits.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::types::WorkItem;

/// A FIFO of URLs that workers claim from atomically.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl WorkQueue {
    /// Seed a queue with URLs, numbering them by input position.
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| WorkItem {
                index,
                url: url.into(),
            })
            .collect();
        Self {
            items: Mutex::new(items),
        }
    }

    /// Claim the next item, or `None` if the queue is exhausted.
    ///
    /// Each item is handed out exactly once.
    pub fn claim(&self) -> Option<WorkItem> {
        self.lock().pop_front()
    }

    /// Remove and return every unclaimed item.
    pub fn drain(&self) -> Vec<WorkItem> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A worker that panicked mid-claim leaves the deque itself intact.
    fn lock(&self) -> MutexGuard<'_, VecDeque<WorkItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
