#![forbid(unsafe_code)]

//! # am-core
//!
//! Core types shared by every active module: signal identifiers, the message
//! envelope that travels through a module mailbox, and the flat state machine
//! engine that interprets those messages.
//!
//! ## Module Overview
//! - [`signal`]  – Signal identifiers and the reserved lifecycle signals.
//! - [`message`] – Message envelope with a move-only payload.
//! - [`state`]   – State handlers, transition requests and the dispatcher.

pub mod message;
pub mod signal;
pub mod state;

pub use message::{Message, Payload};
pub use signal::Signal;
pub use state::{
    State, StateContext, StateEvent, StateHandler, StateMachine, StateResult, Transitions,
    MAX_TRANSITION_CHAIN,
};


/// Crate version, reported by modules in their start-up trace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
