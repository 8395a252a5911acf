//! Liveness counters.
//!
//! Keys appear on a component's first keep-alive and stay until
//! [`clear`](LivenessRegistry::clear). A counter of zero after a sweep means
//! the component was silent for the whole period.

use std::collections::BTreeMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct LivenessRegistry {
    counters: Mutex<BTreeMap<String, u32>>,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one keep-alive from `component`. Returns `true` when the
    /// component was not known yet.
    pub fn notify(&self, component: &str) -> bool {
        let mut counters = self.counters.lock();
        match counters.get_mut(component) {
            Some(count) => {
                *count = count.saturating_add(1);
                false
            }
            None => {
                counters.insert(component.to_string(), 1);
                true
            }
        }
    }

    /// Consumes this period's credits. Components with a zero counter are
    /// returned in name order and left at zero; all others are reset.
    pub fn sweep(&self) -> Vec<String> {
        let mut counters = self.counters.lock();
        let mut silent = Vec::new();
        for (name, count) in counters.iter_mut() {
            if *count == 0 {
                silent.push(name.clone());
            } else {
                *count = 0;
            }
        }
        silent
    }

    pub fn clear(&self) {
        self.counters.lock().clear();
    }

    pub fn counter(&self, component: &str) -> Option<u32> {
        self.counters.lock().get(component).copied()
    }

    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_notification_registers() {
        let registry = LivenessRegistry::new();
        assert!(registry.notify("Sensor"));
        assert!(!registry.notify("Sensor"));
        assert_eq!(registry.counter("Sensor"), Some(2));
        assert_eq!(registry.counter("Relay"), None);
    }

    #[test]
    fn sweep_resets_live_and_reports_silent() {
        let registry = LivenessRegistry::new();
        registry.notify("Sensor");
        registry.notify("Relay");

        assert!(registry.sweep().is_empty());
        assert_eq!(registry.counter("Sensor"), Some(0));

        registry.notify("Relay");
        assert_eq!(registry.sweep(), vec!["Sensor".to_string()]);
        assert_eq!(registry.sweep(), vec!["Relay".to_string(), "Sensor".to_string()]);
    }

    #[test]
    fn clear_forgets_everything() {
        let registry = LivenessRegistry::new();
        registry.notify("Sensor");
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.sweep().is_empty());
    }

    #[test]
    fn concurrent_keepalives_and_sweeps_stay_consistent() {
        const NOTIFIERS: usize = 4;
        const NAMES_EACH: usize = 25;
        const ROUNDS: usize = 200;

        let registry = Arc::new(LivenessRegistry::new());
        let first_seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let sweeper = {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut sweeps = 0usize;
                while !done.load(Ordering::SeqCst) {
                    registry.sweep();
                    sweeps += 1;
                }
                sweeps
            })
        };

        let notifiers: Vec<_> = (0..NOTIFIERS)
            .map(|n| {
                let registry = Arc::clone(&registry);
                let first_seen = Arc::clone(&first_seen);
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        for i in 0..NAMES_EACH {
                            if registry.notify(&format!("task{n}-{i}")) {
                                first_seen.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                })
            })
            .collect();
        for notifier in notifiers {
            notifier.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        assert!(sweeper.join().unwrap() > 0);

        let total = NOTIFIERS * NAMES_EACH;
        assert_eq!(first_seen.load(Ordering::SeqCst), total);
        assert_eq!(registry.len(), total);

        for n in 0..NOTIFIERS {
            for i in 0..NAMES_EACH {
                assert!(!registry.notify(&format!("task{n}-{i}")));
            }
        }
        assert!(registry.sweep().is_empty());
        assert_eq!(registry.counter("task0-0"), Some(0));
        assert_eq!(registry.sweep().len(), total);
    }
}
