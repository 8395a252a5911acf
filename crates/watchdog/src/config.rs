#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Topic on which components publish their keep-alives.
pub const DEFAULT_KEEPALIVE_TOPIC: &str = "sys/keepalive";

/// Fault notifications go to `<FAULT_TOPIC_BASE>/<supervisor name>`.
pub const FAULT_TOPIC_BASE: &str = "stat/timeout";

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub name: String,
    pub keepalive_topic: String,
    /// Enables info/debug logging of registrations and keep-alives.
    pub debug: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            name: String::from("twd"),
            keepalive_topic: String::from(DEFAULT_KEEPALIVE_TOPIC),
            debug: false,
        }
    }
}

impl WatchdogConfig {
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }

    pub fn fault_topic(&self) -> String {
        format!("{FAULT_TOPIC_BASE}/{}", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn keepalive_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.keepalive_topic = topic.into();
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    pub fn build(self) -> WatchdogConfig {
        self.config
    }
}
