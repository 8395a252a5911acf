//! In-process broker.
//!
//! Publications are delivered synchronously on the publisher's thread. The
//! subscription table lock is released before any callback runs, so a
//! callback may publish or subscribe again without deadlocking.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::topic;
use crate::{
    Broker, BrokerError, BrokerResult, PublishCallback, SubscribeCallback, SubscriptionId,
    DEFAULT_MAX_PAYLOAD_LEN,
};

struct Subscription {
    id: SubscriptionId,
    filter: String,
    callback: SubscribeCallback,
}

/// Broker that routes publications between components of one process.
pub struct LocalBroker {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU32,
    available: AtomicBool,
    published: AtomicU64,
    max_payload: usize,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_LEN)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
            available: AtomicBool::new(true),
            published: AtomicU64::new(0),
            max_payload,
        }
    }

    /// Takes the broker offline (or back online). While offline every
    /// operation fails with [`BrokerError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of publications accepted so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    fn ensure_available(&self) -> BrokerResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Unavailable)
        }
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for LocalBroker {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        done: Option<&PublishCallback>,
    ) -> BrokerResult<()> {
        let result = self.ensure_available().and_then(|()| {
            topic::validate_topic(topic)?;
            if payload.len() > self.max_payload {
                return Err(BrokerError::PayloadTooLarge(payload.len()));
            }
            Ok(())
        });

        if result.is_ok() {
            let targets: Vec<SubscribeCallback> = self
                .subscriptions
                .read()
                .iter()
                .filter(|sub| topic::matches(&sub.filter, topic))
                .map(|sub| SubscribeCallback::clone(&sub.callback))
                .collect();
            self.published.fetch_add(1, Ordering::Relaxed);
            log::trace!("publish {topic} ({} bytes) to {} subscribers", payload.len(), targets.len());
            for callback in targets {
                callback(topic, payload);
            }
        }

        if let Some(done) = done {
            done(topic, &result);
        }
        result
    }

    fn subscribe(&self, filter: &str, callback: SubscribeCallback) -> BrokerResult<SubscriptionId> {
        self.ensure_available()?;
        topic::validate_filter(filter)?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            filter: filter.to_string(),
            callback,
        });
        log::trace!("subscribe {filter} as {id:?}");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> BrokerResult<()> {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        if subscriptions.len() == before {
            return Err(BrokerError::UnknownSubscription(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (SubscribeCallback, Arc<Mutex<Vec<(String, Vec<u8>)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let callback: SubscribeCallback = Arc::new(move |topic: &str, payload: &[u8]| {
            sink.lock().unwrap().push((topic.to_string(), payload.to_vec()));
        });
        (callback, log)
    }

    #[test]
    fn delivers_to_matching_subscribers_only() {
        let broker = LocalBroker::new();
        let (exact, exact_log) = recorder();
        let (wild, wild_log) = recorder();
        broker.subscribe("stat/value", exact).unwrap();
        broker.subscribe("stat/#", wild).unwrap();

        broker.publish("stat/value", b"1", None).unwrap();
        broker.publish("stat/other", b"2", None).unwrap();
        broker.publish("set/value", b"3", None).unwrap();

        assert_eq!(exact_log.lock().unwrap().len(), 1);
        assert_eq!(wild_log.lock().unwrap().len(), 2);
        assert_eq!(broker.published(), 3);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let broker = LocalBroker::new();
        let (callback, log) = recorder();
        let id = broker.subscribe("a/b", callback).unwrap();
        broker.unsubscribe(id).unwrap();
        broker.publish("a/b", b"x", None).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(
            broker.unsubscribe(id),
            Err(BrokerError::UnknownSubscription(id))
        );
    }

    #[test]
    fn completion_callback_sees_result() {
        let broker = LocalBroker::with_max_payload(4);
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let done: PublishCallback = Arc::new(move |_topic: &str, result: &BrokerResult<()>| {
            sink.lock().unwrap().push(result.clone());
        });

        broker.publish("a/b", b"ok", Some(&done)).unwrap();
        let err = broker.publish("a/b", b"too long", Some(&done)).unwrap_err();
        assert_eq!(err, BrokerError::PayloadTooLarge(8));
        assert_eq!(
            results.lock().unwrap().as_slice(),
            &[Ok(()), Err(BrokerError::PayloadTooLarge(8))]
        );
    }

    #[test]
    fn offline_broker_rejects_operations() {
        let broker = LocalBroker::new();
        broker.set_available(false);
        let (callback, _) = recorder();
        assert_eq!(
            broker.subscribe("a", callback).unwrap_err(),
            BrokerError::Unavailable
        );
        assert_eq!(
            broker.publish("a", b"", None).unwrap_err(),
            BrokerError::Unavailable
        );
    }

    #[test]
    fn callbacks_may_publish_reentrantly() {
        let broker = Arc::new(LocalBroker::new());
        let (callback, log) = recorder();
        broker.subscribe("pong", callback).unwrap();

        let inner = Arc::clone(&broker);
        broker
            .subscribe(
                "ping",
                Arc::new(move |_topic: &str, payload: &[u8]| {
                    let _ = inner.publish("pong", payload, None);
                }),
            )
            .unwrap();

        broker.publish("ping", b"hi", None).unwrap();
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[("pong".to_string(), b"hi".to_vec())]
        );
    }
}
