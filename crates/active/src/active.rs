//! Module thread lifecycle.
//!
//! [`ActiveModule::new`] spawns the module thread and returns once that
//! thread is running. The thread then holds at the start gate until both
//! topic bases are assigned, enters the initial state and serves its mailbox
//! until the process exits.

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use am_core::{Message, State, StateEvent, StateMachine, StateResult};
use am_mq::{Broker, SubscribeCallback, SubscriptionId};
use am_nvs::{NvStorage, ValueKind};

use crate::config::ModuleConfig;
use crate::error::ModuleResult;
use crate::event_source::TimedEventSource;
use crate::liveness::{LivenessReporter, NativeTaskWdt, PublishKeepAlive, TaskWdt};
use crate::module::{Module, ModuleContext};
use crate::shared::Shared;
use crate::sync::Semaphore;

/// Cloneable producer handle for a module mailbox.
#[derive(Clone)]
pub struct ModuleHandle {
    shared: Arc<Shared>,
}

impl ModuleHandle {
    pub fn name(&self) -> &str {
        self.shared.identity.name()
    }

    /// Queues `message`, waiting at most the configured put timeout.
    pub fn put_message(&self, message: Message) -> ModuleResult<()> {
        self.shared.enqueue(message, self.shared.put_timeout)
    }

    fn deliver<B: Module>(&self, topic: &str, payload: &[u8]) {
        match B::translate(topic, payload) {
            Some(message) => {
                let _ = self.put_message(message);
            }
            None => module_debug!(self.shared.identity, "ERR_TOPIC cannot process '{topic}'"),
        }
    }
}

/// A running module: one thread, one mailbox, one state machine.
pub struct ActiveModule<B: Module> {
    shared: Arc<Shared>,
    thread: JoinHandle<()>,
    _behavior: PhantomData<fn() -> B>,
}

impl<B: Module> ActiveModule<B> {
    /// Spawns the module thread and waits until it has started.
    pub fn new(
        config: ModuleConfig,
        broker: Arc<dyn Broker>,
        storage: Option<Arc<dyn NvStorage>>,
        behavior: B,
    ) -> ModuleResult<Self> {
        let shared = Arc::new(Shared::new(&config, broker, storage));
        let started = Arc::new(Semaphore::new(0));

        module_debug!(
            shared.identity,
            "Starting thread, priority {}, stack {} bytes",
            config.priority,
            config.stack_size
        );
        let thread = thread::Builder::new()
            .name(config.name.clone())
            .stack_size(config.stack_size)
            .spawn({
                let shared = Arc::clone(&shared);
                let started = Arc::clone(&started);
                move || run(shared, behavior, started)
            })?;
        started.acquire();

        Ok(Self {
            shared,
            thread,
            _behavior: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.shared.identity.name()
    }

    pub fn decorated_name(&self) -> &str {
        self.shared.identity.decorated()
    }

    pub fn debug_active(&self) -> bool {
        self.shared.identity.debug_active()
    }

    /// `true` once the initial state has processed `ENTRY`.
    pub fn ready(&self) -> bool {
        self.shared.is_ready()
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }

    pub fn handle(&self) -> ModuleHandle {
        ModuleHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Assigns the publication base. May be set once.
    pub fn set_publication_base(&self, base: &str) -> ModuleResult<()> {
        self.shared.set_publication_base(base)
    }

    /// Assigns the subscription base. May be set once.
    pub fn set_subscription_base(&self, base: &str) -> ModuleResult<()> {
        self.shared.set_subscription_base(base)
    }

    pub fn publication_base(&self) -> Option<&str> {
        self.shared.publication_base()
    }

    pub fn subscription_base(&self) -> Option<&str> {
        self.shared.subscription_base()
    }

    /// Queues `message`, waiting at most the configured put timeout.
    pub fn put_message(&self, message: Message) -> ModuleResult<()> {
        self.shared.enqueue(message, self.shared.put_timeout)
    }

    /// Subscribes to `filter`; matching publications pass through
    /// [`Module::translate`] into the mailbox.
    pub fn subscribe(&self, filter: &str) -> ModuleResult<SubscriptionId> {
        let handle = self.handle();
        let callback: SubscribeCallback =
            Arc::new(move |topic: &str, payload: &[u8]| handle.deliver::<B>(topic, payload));
        let id = self.shared.broker.subscribe(filter, callback)?;
        module_debug!(self.shared.identity, "Subscribed to {filter}");
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> ModuleResult<()> {
        self.shared.broker.unsubscribe(id)?;
        Ok(())
    }

    /// Starts publishing `component` on `topic` at least every `period_ms`.
    ///
    /// The first keep-alive is published before returning; if it fails the
    /// module stays unattached. A zero period is rejected.
    pub fn attach_to_watchdog(&self, period_ms: u32, topic: &str, component: &str) -> ModuleResult<()> {
        let reporter = PublishKeepAlive::new(Arc::clone(&self.shared.broker), topic, component);
        self.attach_liveness(Duration::from_millis(u64::from(period_ms)), Box::new(reporter))
    }

    /// Registers the module thread with a native task watchdog.
    pub fn attach_to_task_wdt(&self, period_ms: u32, wdt: Arc<dyn TaskWdt>) -> ModuleResult<()> {
        let reporter = NativeTaskWdt::new(wdt, self.thread_id());
        self.attach_liveness(Duration::from_millis(u64::from(period_ms)), Box::new(reporter))
    }

    /// Attaches an arbitrary liveness reporter.
    pub fn attach_liveness(
        &self,
        period: Duration,
        reporter: Box<dyn LivenessReporter>,
    ) -> ModuleResult<()> {
        self.shared.heartbeat.attach(period, reporter)?;
        self.shared.mailbox.interrupt();
        Ok(())
    }

    pub fn detach_from_watchdog(&self) -> ModuleResult<()> {
        self.shared.heartbeat.detach()?;
        self.shared.mailbox.interrupt();
        Ok(())
    }

    pub fn watchdog_attached(&self) -> bool {
        self.shared.heartbeat.is_attached()
    }

    pub fn save_parameter(&self, id: &str, data: &[u8], kind: ValueKind) -> bool {
        self.shared.save_parameter(id, data, kind)
    }

    pub fn restore_parameter(&self, id: &str, buf: &mut [u8], kind: ValueKind) -> bool {
        self.shared.restore_parameter(id, buf, kind)
    }

    pub fn remove_parameter(&self, id: &str) -> bool {
        self.shared.remove_parameter(id)
    }

    /// Messages queued but not yet dispatched.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.mailbox.len()
    }

    /// Highest mailbox occupancy observed so far.
    pub fn max_queue_depth(&self) -> usize {
        self.shared.mailbox.max_depth()
    }
}

fn init_trampoline<B: Module>(
    behavior: &mut B,
    ctx: &mut ModuleContext<B>,
    event: &mut StateEvent,
) -> StateResult {
    behavior.init(ctx, event)
}

fn run<B: Module>(shared: Arc<Shared>, mut behavior: B, started: Arc<Semaphore>) {
    started.release();
    drop(started);

    while !shared.bases_assigned() {
        thread::sleep(shared.start_poll);
    }
    module_info!(
        shared.identity,
        "Topic bases assigned, entering initial state (runtime {})",
        am_core::VERSION
    );

    let mut ctx = ModuleContext::<B>::new(Arc::clone(&shared));
    let mut machine = StateMachine::new();
    machine.init_state(&mut behavior, &mut ctx, State::new("Init", init_trampoline::<B>));
    shared.ready.store(true, Ordering::Release);

    let source = TimedEventSource::new(&shared.mailbox, &shared.heartbeat);
    loop {
        let message = source.next();
        shared.release_in_flight();
        machine.run(&mut behavior, &mut ctx, StateEvent::from_message(message));
    }
}
