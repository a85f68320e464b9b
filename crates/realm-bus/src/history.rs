//! # Event History
//!
//! Bounded FIFO of events seen by a bus, published or received.

use crate::subscription::EventFilter;
use realm_types::Event;
use std::collections::VecDeque;

/// Ring buffer of recent events. The oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<Event>,
    max_len: usize,
}

impl EventHistory {
    /// Create a history holding at most `max_len` events.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_len.min(1024)),
            max_len,
        }
    }

    /// Append an event, evicting from the front past the bound.
    pub fn push(&mut self, event: Event) {
        if self.max_len == 0 {
            return;
        }
        while self.events.len() >= self.max_len {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// At most `limit` most-recent matches, oldest first.
    #[must_use]
    pub fn query(&self, filter: &EventFilter, limit: usize) -> Vec<Event> {
        let mut matches: Vec<Event> = self
            .events
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .take(limit)
            .cloned()
            .collect();
        matches.reverse();
        matches
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Configured bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_len
    }

    /// Oldest stored event.
    #[must_use]
    pub fn oldest(&self) -> Option<&Event> {
        self.events.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_types::{Payload, Tags};

    fn event(name: &str) -> Event {
        Event::new(name, "alpha", Payload::new(), Tags::new())
    }

    #[test]
    fn test_bound_evicts_oldest_first() {
        let mut history = EventHistory::new(3);
        for i in 0..4 {
            history.push(event(&format!("e.{i}")));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest().unwrap().name, "e.1");
    }

    #[test]
    fn test_query_returns_most_recent_oldest_first() {
        let mut history = EventHistory::new(10);
        for i in 0..5 {
            history.push(event(&format!("e.{i}")));
        }
        history.push(event("other"));

        let names: Vec<_> = history
            .query(&EventFilter::pattern("e.*"), 2)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["e.3", "e.4"]);
    }

    #[test]
    fn test_zero_bound_keeps_nothing() {
        let mut history = EventHistory::new(0);
        history.push(event("e"));
        assert!(history.is_empty());
    }
}
