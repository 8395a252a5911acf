#![forbid(unsafe_code)]

//! # am-watchdog
//!
//! Task watchdog supervisor. Components prove liveness by publishing their
//! name on a shared keep-alive topic; the supervisor counts those
//! notifications and sweeps the counts once per timeout period. Every
//! component that stayed silent for a whole period is reported on
//! `stat/timeout/<supervisor>`, and an optional fail-safe callback runs
//! after a grace delay.
//!
//! ## Module Overview
//! - [`registry`]   – liveness counters keyed by component name.
//! - [`timer`]      – periodic sweep timer thread.
//! - [`supervisor`] – [`TaskWatchdog`] start/stop lifecycle and fault reaction.
//! - [`config`]     – [`WatchdogConfig`] and builder.

pub mod config;
pub mod registry;
pub mod supervisor;
pub mod timer;

use std::io;

use am_mq::BrokerError;
use thiserror::Error;

pub use config::{WatchdogConfig, WatchdogConfigBuilder, DEFAULT_KEEPALIVE_TOPIC, FAULT_TOPIC_BASE};
pub use registry::LivenessRegistry;
pub use supervisor::{TaskWatchdog, TimeoutCallback};
pub use timer::PeriodicTimer;

#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("keep-alive subscription failed: {0}")]
    Subscribe(#[from] BrokerError),
    #[error("failed to start sweep timer: {0}")]
    Timer(#[from] io::Error),
}

pub type WatchdogResult<T> = Result<T, WatchdogError>;
