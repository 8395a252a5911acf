use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use am_active::{ActiveModule, Module, ModuleConfig, ModuleContext, StateEvent, StateResult};
use am_mq::{parse_cstr, Broker, LocalBroker};
use am_watchdog::{TaskWatchdog, WatchdogConfig};
use parking_lot::Mutex;

struct Idle;

impl Module for Idle {
    fn init(&mut self, _ctx: &mut ModuleContext<Self>, ev: &mut StateEvent) -> StateResult {
        match ev.signal() {
            am_active::Signal::ENTRY => StateResult::Handled,
            _ => StateResult::Ignored,
        }
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

#[test]
fn idle_module_keeps_supervisor_quiet_until_detached() {
    let broker = Arc::new(LocalBroker::new());
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&faults);
    broker
        .subscribe(
            "stat/timeout/twd",
            Arc::new(move |_: &str, payload: &[u8]| {
                sink.lock().push(parse_cstr(payload).unwrap_or_default().to_owned());
            }),
        )
        .unwrap();

    let twd = TaskWatchdog::new(WatchdogConfig::default(), broker.clone());
    let resets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resets);
    twd.attach_timeout_callback(0, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    twd.start(100).unwrap();

    let module = ActiveModule::new(
        ModuleConfig::builder()
            .name("Idle")
            .start_poll(Duration::from_millis(10))
            .build(),
        broker.clone(),
        None,
        Idle,
    )
    .unwrap();
    module.set_publication_base("stat/idle").unwrap();
    module.set_subscription_base("set/idle/#").unwrap();
    module.attach_to_watchdog(30, "sys/keepalive", "Idle").unwrap();

    thread::sleep(Duration::from_millis(350));
    assert!(faults.lock().is_empty(), "unexpected faults: {:?}", faults.lock());
    assert_eq!(resets.load(Ordering::SeqCst), 0);

    module.detach_from_watchdog().unwrap();
    thread::sleep(Duration::from_millis(350));
    twd.stop();

    let faults = faults.lock();
    assert!(!faults.is_empty());
    assert!(faults.iter().all(|list| list == "Idle"));
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}
