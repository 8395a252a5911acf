#![forbid(unsafe_code)]

//! # am-active
//!
//! Active modules: each module owns one thread, one bounded mailbox and one
//! state machine. Producers on any thread post [`Message`]s with
//! [`ActiveModule::put_message`]; the module thread dequeues them in FIFO
//! order and dispatches them into its current state.
//!
//! ```text
//!  producer ──put_message──► Mailbox ──► TimedEventSource ──► StateMachine
//!                                             │ timeout
//!                                             ▼
//!                                         Heartbeat ──► LivenessReporter
//! ```
//!
//! ## Module Overview
//! - [`mailbox`]      – bounded blocking FIFO.
//! - [`event_source`] – mailbox wait with a keep-alive period.
//! - [`liveness`]     – keep-alive reporters (publish-based or native task watchdog).
//! - [`module`]       – the [`Module`] capability trait and the handler context.
//! - [`active`]       – thread lifecycle, start gate and event loop.
//! - [`config`]       – construction parameters.

#[macro_use]
mod macros;

pub mod active;
pub mod config;
pub mod error;
pub mod event_source;
pub mod liveness;
pub mod mailbox;
pub mod module;
pub mod name;
mod params;
mod shared;
mod sync;

pub use active::{ActiveModule, ModuleHandle};
pub use config::{ModuleConfig, ModuleConfigBuilder, ThreadPriority};
pub use error::{LivenessError, ModuleError, ModuleResult};
pub use event_source::TimedEventSource;
pub use liveness::{Heartbeat, LivenessReporter, NativeTaskWdt, PublishKeepAlive, TaskWdt};
pub use mailbox::{Full, Mailbox, Recv};
pub use module::{ConfigOrigin, Module, ModuleContext};
pub use name::{Identity, MAX_NAME_LENGTH};

pub use am_core::{Message, Signal, State, StateContext, StateEvent, StateResult};
pub use am_nvs::ValueKind;

#[cfg(test)]
mod tests;

/// Capacity of every module mailbox.
pub const DEFAULT_MAX_QUEUE_MESSAGES: usize = 16;
