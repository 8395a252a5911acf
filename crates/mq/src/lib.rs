//! # am-mq
//!
//! Narrow publish/subscribe interface consumed by active modules and the
//! task watchdog, plus [`LocalBroker`], an in-process implementation used by
//! host builds and tests.
//!
//! Payloads are opaque byte slices. Text payloads follow the convention of
//! the device firmware: UTF-8 terminated by a single NUL byte (see
//! [`cstr_payload`] and [`parse_cstr`]).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

mod local;
pub mod topic;

pub use local::LocalBroker;

/// Longest topic name accepted by the broker, in bytes.
pub const DEFAULT_MAX_TOPIC_LEN: usize = 64;

/// Longest payload accepted by [`LocalBroker`], in bytes.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 1024;

/// Bound on how long a producer waits on a shared lock before giving up.
/// Mailbox submissions reuse it so a publisher never blocks indefinitely.
pub const DEFAULT_MUTEX_TIMEOUT: Duration = Duration::from_millis(100);

/// Handle returned by [`Broker::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u32);

/// Errors reported by a broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("invalid topic `{0}`")]
    InvalidTopic(String),
    #[error("topic exceeds {max} bytes")]
    TopicTooLong { max: usize },
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("unknown subscription {0:?}")]
    UnknownSubscription(SubscriptionId),
    #[error("broker unavailable")]
    Unavailable,
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Receives `(topic, payload)` for every matching publication.
pub type SubscribeCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Receives `(topic, result)` once a publication has been delivered.
pub type PublishCallback = Arc<dyn Fn(&str, &BrokerResult<()>) + Send + Sync>;

/// Publish/subscribe collaborator.
pub trait Broker: Send + Sync {
    /// Publishes `payload` on `topic`. `done`, when given, observes the
    /// delivery result.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        done: Option<&PublishCallback>,
    ) -> BrokerResult<()>;

    /// Registers `callback` for every topic matching `filter`.
    fn subscribe(&self, filter: &str, callback: SubscribeCallback) -> BrokerResult<SubscriptionId>;

    fn unsubscribe(&self, id: SubscriptionId) -> BrokerResult<()>;
}

/// Encodes `text` as a NUL-terminated payload.
pub fn cstr_payload(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

/// Decodes a NUL-terminated payload.
///
/// The payload is valid only when its first NUL is its last byte, i.e. the
/// embedded string length plus one equals the payload length, and the text
/// is UTF-8.
pub fn parse_cstr(payload: &[u8]) -> Option<&str> {
    let (&last, text) = payload.split_last()?;
    if last != 0 || text.contains(&0) {
        return None;
    }
    std::str::from_utf8(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cstr_roundtrip() {
        let payload = cstr_payload("Sensor");
        assert_eq!(payload, b"Sensor\0");
        assert_eq!(parse_cstr(&payload), Some("Sensor"));
    }

    #[test]
    fn cstr_rejects_length_mismatch() {
        assert_eq!(parse_cstr(b""), None);
        assert_eq!(parse_cstr(b"Sensor"), None);
        assert_eq!(parse_cstr(b"Sen\0sor\0"), None);
        assert_eq!(parse_cstr(b"Sensor\0\0"), None);
        assert_eq!(parse_cstr(&[0xff, 0xfe, 0]), None);
    }

    #[test]
    fn empty_string_is_a_valid_payload() {
        assert_eq!(parse_cstr(b"\0"), Some(""));
    }
}
