//! Topic name helpers.
//!
//! Topics are `/`-separated levels. Subscription filters may use `+` for a
//! single level and a trailing `#` for any number of remaining levels.

use crate::{BrokerError, BrokerResult, DEFAULT_MAX_TOPIC_LEN};

/// Validates a topic used for publishing.
pub fn validate_topic(topic: &str) -> BrokerResult<()> {
    if topic.is_empty() || topic.contains(['+', '#', '\0']) {
        return Err(BrokerError::InvalidTopic(topic.to_string()));
    }
    check_len(topic)
}

/// Validates a subscription filter.
pub fn validate_filter(filter: &str) -> BrokerResult<()> {
    if filter.is_empty() || filter.contains('\0') {
        return Err(BrokerError::InvalidTopic(filter.to_string()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (idx, level) in levels.iter().enumerate() {
        let wildcard_misuse = (level.contains('+') && *level != "+")
            || (level.contains('#') && (*level != "#" || idx + 1 != levels.len()));
        if wildcard_misuse {
            return Err(BrokerError::InvalidTopic(filter.to_string()));
        }
    }
    check_len(filter)
}

fn check_len(name: &str) -> BrokerResult<()> {
    if name.len() > DEFAULT_MAX_TOPIC_LEN {
        return Err(BrokerError::TopicTooLong {
            max: DEFAULT_MAX_TOPIC_LEN,
        });
    }
    Ok(())
}

/// Returns `true` when `topic` matches the subscription `filter`.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Returns `true` when `topic` contains `token`, e.g. `"/value/cmd"`.
pub fn is_token(topic: &str, token: &str) -> bool {
    topic.contains(token)
}

/// Joins a topic base and a suffix with exactly one separator.
pub fn join(base: &str, suffix: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() {
        return base.to_string();
    }
    format!("{base}/{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_matching() {
        assert!(matches("stat/timeout/twd", "stat/timeout/twd"));
        assert!(!matches("stat/timeout/twd", "stat/timeout"));
        assert!(matches("stat/+/twd", "stat/timeout/twd"));
        assert!(!matches("stat/+", "stat/timeout/twd"));
        assert!(matches("set/greenhouse/#", "set/greenhouse/setpoint/cmd"));
        assert!(matches("#", "anything/at/all"));
        assert!(!matches("set/greenhouse/#", "get/greenhouse/value"));
    }

    #[test]
    fn filters_reject_misplaced_wildcards() {
        assert!(validate_filter("a/#").is_ok());
        assert!(validate_filter("a/+/c").is_ok());
        assert!(validate_filter("a/#/c").is_err());
        assert!(validate_filter("a/b+").is_err());
        assert!(validate_filter("").is_err());
    }

    #[test]
    fn publish_topics_reject_wildcards_and_length() {
        assert!(validate_topic("stat/value").is_ok());
        assert!(validate_topic("stat/+").is_err());
        let long = "x".repeat(DEFAULT_MAX_TOPIC_LEN + 1);
        assert_eq!(
            validate_topic(&long),
            Err(BrokerError::TopicTooLong {
                max: DEFAULT_MAX_TOPIC_LEN
            })
        );
    }

    #[test]
    fn join_normalises_separators() {
        assert_eq!(join("stat/greenhouse/", "/value"), "stat/greenhouse/value");
        assert_eq!(join("stat/greenhouse", "value/cmd"), "stat/greenhouse/value/cmd");
        assert_eq!(join("stat", ""), "stat");
    }
}
