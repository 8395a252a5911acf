use std::io;

use am_core::Signal;
use am_mq::BrokerError;
use thiserror::Error;

/// Failures surfaced by the active module core.
///
/// None of these is fatal to the module thread: callers get the error back
/// and the module keeps running.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The mailbox stayed full for the whole put timeout.
    #[error("mailbox full, message {0} dropped")]
    ResourceExhaustion(Signal),
    #[error("watchdog integration failed: {0}")]
    Integration(#[from] LivenessError),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("topic base already assigned")]
    TopicBaseAlreadySet,
    #[error("failed to spawn module thread: {0}")]
    Spawn(#[from] io::Error),
}

pub type ModuleResult<T> = Result<T, ModuleError>;

/// Failures of a liveness reporter.
#[derive(Error, Debug)]
pub enum LivenessError {
    #[error("keep-alive publish failed: {0}")]
    Publish(#[from] BrokerError),
    #[error("task watchdog rejected the thread: {0}")]
    TaskWdt(String),
    #[error("keep-alive period must be greater than zero")]
    ZeroPeriod,
}
