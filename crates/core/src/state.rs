//! Flat state machine engine.
//!
//! A state is a named handler function. The engine keeps a pointer to the
//! current state and feeds it one [`StateEvent`] at a time. Handlers change
//! state through their context: [`StateContext::tran_state`] queues the
//! target and makes the engine deliver `EXIT` to the current state; the
//! target becomes current (and receives `ENTRY`) once the exit handler calls
//! [`StateContext::next_state`] or declines the `EXIT` event.
//!
//! ```text
//!   handler ──tran_state(B)──► EXIT ─► A ──next_state()──► ENTRY ─► B
//!                                       └─ Ignored ───────────────┘
//! ```
//!
//! A handler that returns `Handled` for `EXIT` without calling `next_state`
//! defers the transition until some later handler does.

use core::fmt;

use crate::message::Message;
use crate::signal::Signal;

/// Upper bound on ENTRY-triggered transition chains processed in one
/// dispatch.
pub const MAX_TRANSITION_CHAIN: usize = 8;

/// Result returned by every state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateResult {
    Handled,
    Ignored,
}

#[cfg(feature = "defmt")]
impl defmt::Format for StateResult {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            StateResult::Handled => defmt::write!(fmt, "Handled"),
            StateResult::Ignored => defmt::write!(fmt, "Ignored"),
        }
    }
}

/// Event delivered to a state handler.
///
/// Lifecycle events carry no message. Application events own the dequeued
/// [`Message`]; it is dropped together with the event when the handler
/// returns unless the handler takes it.
#[derive(Debug)]
pub struct StateEvent {
    signal: Signal,
    message: Option<Message>,
}

impl StateEvent {
    pub fn entry() -> Self {
        Self::lifecycle(Signal::ENTRY)
    }

    pub fn exit() -> Self {
        Self::lifecycle(Signal::EXIT)
    }

    fn lifecycle(signal: Signal) -> Self {
        Self {
            signal,
            message: None,
        }
    }

    pub fn from_message(message: Message) -> Self {
        Self {
            signal: message.signal(),
            message: Some(message),
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Takes ownership of the underlying message, if any.
    pub fn take_message(&mut self) -> Option<Message> {
        self.message.take()
    }

    /// Takes the message payload if it is a `T`.
    pub fn take_payload<T: core::any::Any>(&mut self) -> Option<T> {
        self.message.as_mut()?.take_payload::<T>()
    }
}

/// Handler signature: the machine owner, its context, and the event.
pub type StateHandler<T, C> = fn(&mut T, &mut C, &mut StateEvent) -> StateResult;

/// A named state.
pub struct State<T, C> {
    name: &'static str,
    handler: StateHandler<T, C>,
}

impl<T, C> State<T, C> {
    pub const fn new(name: &'static str, handler: StateHandler<T, C>) -> Self {
        Self { name, handler }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn handle(&self, target: &mut T, ctx: &mut C, event: &mut StateEvent) -> StateResult {
        (self.handler)(target, ctx, event)
    }
}

impl<T, C> Clone for State<T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C> Copy for State<T, C> {}

impl<T, C> fmt::Debug for State<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&self.name).finish()
    }
}

/// Transition requests recorded by handlers during a dispatch.
pub struct Transitions<T, C> {
    target: Option<State<T, C>>,
    exiting: bool,
    proceed: bool,
}

impl<T, C> Transitions<T, C> {
    pub const fn new() -> Self {
        Self {
            target: None,
            exiting: false,
            proceed: false,
        }
    }

    /// Target of a queued transition that has not completed yet.
    pub fn pending(&self) -> Option<&State<T, C>> {
        self.target.as_ref()
    }

    fn request(&mut self, state: State<T, C>) {
        self.target = Some(state);
    }

    fn proceed(&mut self) {
        if self.target.is_some() {
            self.proceed = true;
        }
    }

    fn clear(&mut self) {
        self.target = None;
        self.exiting = false;
        self.proceed = false;
    }
}

impl<T, C> Default for Transitions<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Context type handed to state handlers.
///
/// Implementors only expose their transition slot; the request helpers are
/// provided.
pub trait StateContext<T>: Sized {
    fn transitions(&mut self) -> &mut Transitions<T, Self>;

    /// Queues a transition to `state`; the current state receives `EXIT`
    /// once the running handler returns.
    fn tran_state(&mut self, state: State<T, Self>) {
        self.transitions().request(state);
    }

    /// Completes a queued transition: the target becomes current and
    /// receives `ENTRY`.
    fn next_state(&mut self) {
        self.transitions().proceed();
    }
}

/// Holds the current state and dispatches events into it.
pub struct StateMachine<T, C> {
    current: Option<State<T, C>>,
}

impl<T, C: StateContext<T>> StateMachine<T, C> {
    pub const fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<State<T, C>> {
        self.current
    }

    /// Makes `initial` the current state and delivers its `ENTRY` event.
    pub fn init_state(&mut self, target: &mut T, ctx: &mut C, initial: State<T, C>) -> StateResult {
        ctx.transitions().clear();
        self.current = Some(initial);
        let result = initial.handle(target, ctx, &mut StateEvent::entry());
        self.settle(target, ctx);
        result
    }

    /// Dispatches `event` into the current state, then completes any
    /// transition the handler requested.
    pub fn run(&mut self, target: &mut T, ctx: &mut C, mut event: StateEvent) -> StateResult {
        let Some(state) = self.current else {
            log::warn!("event {} dropped: state machine not initialised", event.signal());
            return StateResult::Ignored;
        };
        let result = state.handle(target, ctx, &mut event);
        drop(event);
        self.settle(target, ctx);
        result
    }

    fn settle(&mut self, target: &mut T, ctx: &mut C) {
        for _ in 0..MAX_TRANSITION_CHAIN {
            let Some(current) = self.current else {
                return;
            };
            let pending = ctx.transitions();
            if pending.target.is_none() {
                return;
            }
            if !pending.exiting {
                pending.exiting = true;
                pending.proceed = false;
                if current.handle(target, ctx, &mut StateEvent::exit()) == StateResult::Ignored {
                    ctx.transitions().proceed();
                }
            }

            let pending = ctx.transitions();
            if !pending.proceed {
                return;
            }
            let next = pending.target.take();
            pending.clear();
            if let Some(next) = next {
                log::trace!("state {} -> {}", current.name(), next.name());
                self.current = Some(next);
                next.handle(target, ctx, &mut StateEvent::entry());
            }
        }

        let pending = ctx.transitions();
        if pending.target.is_some() {
            log::error!(
                "transition chain longer than {MAX_TRANSITION_CHAIN} hops; dropping pending transition"
            );
            pending.clear();
        }
    }
}

impl<T, C: StateContext<T>> Default for StateMachine<T, C> {
    fn default() -> Self {
        Self::new()
    }
}
