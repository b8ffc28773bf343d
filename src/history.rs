//! Bounded adaptation history

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::types::AdaptationEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Most recent adaptation events, oldest evicted first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationHistory {
    events: VecDeque<AdaptationEvent>,
    capacity: usize,
}

impl Default for AdaptationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl AdaptationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: AdaptationEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Oldest-first copy of the retained events
    pub fn snapshot(&self) -> Vec<AdaptationEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&AdaptationEvent> {
        self.events.back()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
