//! Bounded per-service response-time history.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::health::types::ServiceKey;

/// Keeps the most recent latency samples of every service.
#[derive(Debug)]
pub struct ResponseTimeTracker {
    history: DashMap<ServiceKey, VecDeque<u64>>,
    capacity: usize,
}

impl ResponseTimeTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting the oldest once capacity is exceeded.
    pub fn record(&self, key: &ServiceKey, latency_ms: u64) {
        let mut samples = self.history.entry(key.clone()).or_default();
        samples.push_back(latency_ms);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Mean of the current history, `None` when empty.
    pub fn average_latency(&self, key: &ServiceKey) -> Option<f64> {
        let samples = self.history.get(key)?;
        if samples.is_empty() {
            return None;
        }
        let total: u64 = samples.iter().sum();
        Some(total as f64 / samples.len() as f64)
    }

    /// Samples oldest first.
    pub fn samples(&self, key: &ServiceKey) -> Vec<u64> {
        self.history
            .get(key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ResponseTimeTracker {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_has_no_average() {
        let tracker = ResponseTimeTracker::default();
        assert_eq!(tracker.average_latency(&"backend".into()), None);
    }

    #[test]
    fn test_average() {
        let tracker = ResponseTimeTracker::default();
        let key = ServiceKey::from("backend");
        tracker.record(&key, 100);
        tracker.record(&key, 300);
        assert_eq!(tracker.average_latency(&key), Some(200.0));
    }

    #[test]
    fn test_oldest_sample_evicted() {
        let tracker = ResponseTimeTracker::default();
        let key = ServiceKey::from("database");
        for ms in 1..=12 {
            tracker.record(&key, ms);
        }
        let samples = tracker.samples(&key);
        assert_eq!(samples.len(), 10);
        assert_eq!(samples.first(), Some(&3));
        assert_eq!(samples.last(), Some(&12));
        assert_eq!(tracker.average_latency(&key), Some(7.5));
    }

    #[test]
    fn test_histories_are_per_service() {
        let tracker = ResponseTimeTracker::new(3);
        tracker.record(&"a".into(), 10);
        tracker.record(&"b".into(), 1000);
        assert_eq!(tracker.average_latency(&"a".into()), Some(10.0));
        assert_eq!(tracker.average_latency(&"b".into()), Some(1000.0));
    }
}
