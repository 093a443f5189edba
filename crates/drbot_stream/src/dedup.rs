//! Bounded recent-id window.

use drbot_core::SubjectId;
use std::collections::{HashSet, VecDeque};

/// Remembers the last `capacity` subject ids, evicting oldest first.
///
/// # Examples
///
/// ```
/// use drbot_core::SubjectId;
/// use drbot_stream::DedupWindow;
///
/// let mut window = DedupWindow::new(2);
/// assert!(window.insert(SubjectId::new("a")));
/// assert!(!window.insert(SubjectId::new("a")));
/// window.insert(SubjectId::new("b"));
/// window.insert(SubjectId::new("c"));
/// assert!(!window.contains(&SubjectId::new("a")));
/// ```
#[derive(Debug, Clone)]
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<SubjectId>,
    seen: HashSet<SubjectId>,
}

impl DedupWindow {
    /// Create an empty window.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Create a window pre-filled with ids, oldest first.
    pub fn seeded<'a>(capacity: usize, ids: impl IntoIterator<Item = &'a SubjectId>) -> Self {
        let mut window = Self::new(capacity);
        for id in ids {
            window.insert(id.clone());
        }
        window
    }

    /// Whether `id` is in the window.
    pub fn contains(&self, id: &SubjectId) -> bool {
        self.seen.contains(id)
    }

    /// Record `id`; returns false if it was already present.
    pub fn insert(&mut self, id: SubjectId) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    /// Number of ids remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
