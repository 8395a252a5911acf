use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use am_core::{Message, Signal, State, StateContext, StateEvent, StateResult};
use am_mq::LocalBroker;
use parking_lot::Mutex;

use super::wait_for;
use crate::{ActiveModule, Module, ModuleConfig, ModuleContext, ModuleError};

const PING_SIG: Signal = Signal(20);
const SLOW_SIG: Signal = Signal(21);
const ECHO_SIG: Signal = Signal(22);
const ECHOED_SIG: Signal = Signal(23);

struct Recorder {
    seen: Arc<Mutex<Vec<Signal>>>,
}

const RUNNING: State<Recorder, ModuleContext<Recorder>> = State::new("Running", running);

fn running(recorder: &mut Recorder, ctx: &mut ModuleContext<Recorder>, ev: &mut StateEvent) -> StateResult {
    let signal = ev.signal();
    match signal {
        Signal::EXIT => return StateResult::Ignored,
        SLOW_SIG => thread::sleep(Duration::from_millis(300)),
        ECHO_SIG => {
            let _ = ctx.post_self(Message::new(ECHOED_SIG));
        }
        _ => {}
    }
    recorder.seen.lock().push(signal);
    StateResult::Handled
}

impl Module for Recorder {
    fn init(&mut self, ctx: &mut ModuleContext<Self>, ev: &mut StateEvent) -> StateResult {
        if ev.signal() == Signal::ENTRY {
            ctx.tran_state(RUNNING);
            return StateResult::Handled;
        }
        StateResult::Ignored
    }

    fn check_integrity(&self) -> bool {
        true
    }

    fn set_default_config(&mut self) {}

    fn restore_config(&mut self, _ctx: &ModuleContext<Self>) -> bool {
        true
    }

    fn save_config(&self, _ctx: &ModuleContext<Self>) -> bool {
        true
    }
}

fn spawn_recorder(config: ModuleConfig) -> (ActiveModule<Recorder>, Arc<Mutex<Vec<Signal>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder {
        seen: Arc::clone(&seen),
    };
    let module = ActiveModule::new(config, Arc::new(LocalBroker::new()), None, recorder).unwrap();
    (module, seen)
}

fn started_recorder(name: &str) -> (ActiveModule<Recorder>, Arc<Mutex<Vec<Signal>>>) {
    let (module, seen) = spawn_recorder(ModuleConfig::builder().name(name).build());
    module.set_publication_base("stat/recorder").unwrap();
    module.set_subscription_base("set/recorder/#").unwrap();
    assert!(wait_for(Duration::from_secs(2), || module.ready()));
    (module, seen)
}

#[test]
fn start_gate_holds_until_both_bases_are_set() {
    let (module, seen) = spawn_recorder(
        ModuleConfig::builder()
            .name("Gate")
            .start_poll(Duration::from_millis(10))
            .build(),
    );
    module.set_publication_base("stat/gate").unwrap();
    thread::sleep(Duration::from_millis(60));
    assert!(!module.ready());
    assert!(seen.lock().is_empty());

    module.set_subscription_base("set/gate/#").unwrap();
    assert!(wait_for(Duration::from_secs(2), || module.ready()));
    assert_eq!(*seen.lock(), vec![Signal::ENTRY]);
}

#[test]
fn start_gate_opens_within_one_default_poll() {
    let (module, _seen) = spawn_recorder(ModuleConfig::builder().name("Prompt").build());
    assert_eq!(crate::config::DEFAULT_START_POLL, Duration::from_millis(100));
    thread::sleep(Duration::from_millis(30));
    assert!(!module.ready());

    module.set_publication_base("stat/prompt").unwrap();
    module.set_subscription_base("set/prompt/#").unwrap();
    let assigned = Instant::now();
    assert!(wait_for(Duration::from_secs(1), || module.ready()));
    assert!(assigned.elapsed() <= Duration::from_millis(150));
}

#[test]
fn messages_posted_before_start_are_kept() {
    let (module, seen) = spawn_recorder(ModuleConfig::builder().name("Early").build());
    module.put_message(Message::new(PING_SIG)).unwrap();
    assert_eq!(module.in_flight(), 1);

    module.set_publication_base("stat/early").unwrap();
    module.set_subscription_base("set/early/#").unwrap();
    assert!(wait_for(Duration::from_secs(2), || seen.lock().len() == 2));
    assert_eq!(*seen.lock(), vec![Signal::ENTRY, PING_SIG]);
    assert_eq!(module.in_flight(), 0);
}

#[test]
fn messages_are_dispatched_in_fifo_order() {
    let (module, seen) = started_recorder("Fifo");
    let signals: Vec<Signal> = (100..110).map(Signal).collect();
    for &signal in &signals {
        module.put_message(Message::new(signal)).unwrap();
    }
    assert!(wait_for(Duration::from_secs(2), || seen.lock().len() == 11));
    assert_eq!(&seen.lock()[1..], signals.as_slice());
}

#[test]
fn full_mailbox_rejects_after_put_timeout() {
    let (module, seen) = spawn_recorder(
        ModuleConfig::builder()
            .name("Full")
            .put_timeout(Duration::from_millis(10))
            .build(),
    );
    module.set_publication_base("stat/full").unwrap();
    module.set_subscription_base("set/full/#").unwrap();
    assert!(wait_for(Duration::from_secs(2), || module.ready()));

    module.put_message(Message::new(SLOW_SIG)).unwrap();
    assert!(wait_for(Duration::from_secs(1), || module.in_flight() == 0));

    for _ in 0..crate::DEFAULT_MAX_QUEUE_MESSAGES {
        module.put_message(Message::new(PING_SIG)).unwrap();
    }
    let rejected = module.put_message(Message::new(ECHO_SIG));
    assert!(matches!(rejected, Err(ModuleError::ResourceExhaustion(sig)) if sig == ECHO_SIG));
    assert_eq!(module.max_queue_depth(), crate::DEFAULT_MAX_QUEUE_MESSAGES);

    assert!(wait_for(Duration::from_secs(2), || seen.lock().len() == 18));
    assert!(!seen.lock().contains(&ECHO_SIG));
    assert_eq!(module.in_flight(), 0);
}

#[test]
fn handler_can_post_to_its_own_mailbox() {
    let (module, seen) = started_recorder("Echo");
    module.put_message(Message::new(ECHO_SIG)).unwrap();
    assert!(wait_for(Duration::from_secs(2), || seen.lock().len() == 3));
    assert_eq!(*seen.lock(), vec![Signal::ENTRY, ECHO_SIG, ECHOED_SIG]);
}

#[test]
fn topic_bases_are_write_once() {
    let (module, _seen) = started_recorder("Bases");
    assert_eq!(module.publication_base(), Some("stat/recorder"));
    assert!(matches!(
        module.set_publication_base("stat/other"),
        Err(ModuleError::TopicBaseAlreadySet)
    ));
    assert!(matches!(module.set_subscription_base("set/+bad"), Err(ModuleError::Broker(_))));
}

#[test]
fn identity_is_exposed() {
    let (module, _seen) = spawn_recorder(ModuleConfig::builder().name("Recorder").debug(true).build());
    assert_eq!(module.name(), "Recorder");
    assert_eq!(module.decorated_name(), "[Recorder].........");
    assert!(module.debug_active());
    assert!(!module.ready());
    assert_ne!(module.thread_id(), thread::current().id());
}
