//! Construction parameters for active modules.

use std::fmt;
use std::time::Duration;

use am_mq::DEFAULT_MUTEX_TIMEOUT;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default stack reserved for a module thread.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Interval at which a new module polls for its topic bases.
pub const DEFAULT_START_POLL: Duration = Duration::from_millis(100);

/// Scheduling priority requested for a module thread.
///
/// Hosts without priority control record the value and log it; RTOS ports
/// map it onto their native levels.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThreadPriority {
    Idle,
    Low,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl fmt::Display for ThreadPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ThreadPriority::Idle => "idle",
            ThreadPriority::Low => "low",
            ThreadPriority::BelowNormal => "below-normal",
            ThreadPriority::Normal => "normal",
            ThreadPriority::AboveNormal => "above-normal",
            ThreadPriority::High => "high",
            ThreadPriority::Realtime => "realtime",
        };
        f.write_str(text)
    }
}

/// Configuration for one active module.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub name: String,
    pub priority: ThreadPriority,
    pub stack_size: usize,
    pub debug: bool,
    /// Longest time [`put_message`](crate::ActiveModule::put_message) waits
    /// for mailbox space.
    pub put_timeout: Duration,
    /// Polling interval of the start gate.
    pub start_poll: Duration,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: String::from("Module"),
            priority: ThreadPriority::Normal,
            stack_size: DEFAULT_STACK_SIZE,
            debug: false,
            put_timeout: DEFAULT_MUTEX_TIMEOUT,
            start_poll: DEFAULT_START_POLL,
        }
    }
}

impl ModuleConfig {
    pub fn builder() -> ModuleConfigBuilder {
        ModuleConfigBuilder::default()
    }
}

/// Builder for [`ModuleConfig`].
#[derive(Debug, Clone, Default)]
pub struct ModuleConfigBuilder {
    config: ModuleConfig,
}

impl ModuleConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn priority(mut self, priority: ThreadPriority) -> Self {
        self.config.priority = priority;
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = bytes;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    pub fn put_timeout(mut self, timeout: Duration) -> Self {
        self.config.put_timeout = timeout;
        self
    }

    pub fn start_poll(mut self, interval: Duration) -> Self {
        self.config.start_poll = interval;
        self
    }

    pub fn build(self) -> ModuleConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_broker_timeouts() {
        let config = ModuleConfig::default();
        assert_eq!(config.put_timeout, Duration::from_millis(100));
        assert_eq!(config.start_poll, Duration::from_millis(100));
        assert_eq!(config.priority, ThreadPriority::Normal);
        assert!(!config.debug);
    }

    #[test]
    fn builder_overrides_every_field() {
        let config = ModuleConfig::builder()
            .name("Climate")
            .priority(ThreadPriority::High)
            .stack_size(128 * 1024)
            .debug(true)
            .put_timeout(Duration::from_millis(5))
            .start_poll(Duration::from_millis(1))
            .build();
        assert_eq!(config.name, "Climate");
        assert_eq!(config.priority.to_string(), "high");
        assert_eq!(config.stack_size, 128 * 1024);
        assert!(config.debug);
        assert_eq!(config.put_timeout, Duration::from_millis(5));
        assert_eq!(config.start_poll, Duration::from_millis(1));
    }
}
