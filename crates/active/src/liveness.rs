//! Liveness reporting.
//!
//! A module attached to a supervisor proves it is alive by emitting a
//! keep-alive at least once per period. Two reporters are provided:
//!
//! * [`PublishKeepAlive`] publishes the component name on a broker topic,
//!   where a task watchdog counts it.
//! * [`NativeTaskWdt`] resets a platform task watchdog for the module thread.
//!
//! [`Heartbeat`] paces the emissions: every mailbox timeout kicks the
//! reporter, and a delivered message kicks it only once a full period has
//! passed since the previous kick.

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use am_mq::{cstr_payload, Broker};
use parking_lot::Mutex;

use crate::error::LivenessError;
use crate::name::Identity;

/// Emits keep-alives on behalf of one module.
pub trait LivenessReporter: Send + Sync {
    /// Called once on attach. Failure leaves the module unattached.
    fn register(&self) -> Result<(), LivenessError>;

    fn kick(&self) -> Result<(), LivenessError>;

    /// Called once on detach.
    fn unregister(&self) -> Result<(), LivenessError> {
        Ok(())
    }
}

/// Publishes `component` as a NUL-terminated payload on `topic`.
pub struct PublishKeepAlive {
    broker: Arc<dyn Broker>,
    topic: String,
    payload: Vec<u8>,
}

impl PublishKeepAlive {
    pub fn new(broker: Arc<dyn Broker>, topic: impl Into<String>, component: &str) -> Self {
        Self {
            broker,
            topic: topic.into(),
            payload: cstr_payload(component),
        }
    }
}

impl LivenessReporter for PublishKeepAlive {
    fn register(&self) -> Result<(), LivenessError> {
        self.kick()
    }

    fn kick(&self) -> Result<(), LivenessError> {
        self.broker.publish(&self.topic, &self.payload, None)?;
        Ok(())
    }
}

/// Platform task watchdog keyed by thread.
pub trait TaskWdt: Send + Sync {
    fn add(&self, thread: ThreadId) -> Result<(), LivenessError>;
    fn reset(&self, thread: ThreadId) -> Result<(), LivenessError>;
    fn delete(&self, thread: ThreadId) -> Result<(), LivenessError>;
}

/// Reports liveness of one thread to a [`TaskWdt`].
pub struct NativeTaskWdt {
    wdt: Arc<dyn TaskWdt>,
    thread: ThreadId,
}

impl NativeTaskWdt {
    pub fn new(wdt: Arc<dyn TaskWdt>, thread: ThreadId) -> Self {
        Self { wdt, thread }
    }
}

impl LivenessReporter for NativeTaskWdt {
    fn register(&self) -> Result<(), LivenessError> {
        self.wdt.add(self.thread)
    }

    fn kick(&self) -> Result<(), LivenessError> {
        self.wdt.reset(self.thread)
    }

    fn unregister(&self) -> Result<(), LivenessError> {
        self.wdt.delete(self.thread)
    }
}

struct Link {
    period: Duration,
    reporter: Arc<dyn LivenessReporter>,
    last_kick: Instant,
}

/// Keep-alive pacing for one module.
pub struct Heartbeat {
    identity: Identity,
    link: Mutex<Option<Link>>,
}

impl Heartbeat {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            link: Mutex::new(None),
        }
    }

    /// Registers `reporter` and starts pacing with `period`. An existing
    /// attachment is replaced. A zero period is rejected before the reporter
    /// is registered.
    pub fn attach(
        &self,
        period: Duration,
        reporter: Box<dyn LivenessReporter>,
    ) -> Result<(), LivenessError> {
        if period.is_zero() {
            module_error!(self.identity, "ERR_WDT attach failed: zero keep-alive period");
            return Err(LivenessError::ZeroPeriod);
        }
        if let Err(err) = reporter.register() {
            module_error!(self.identity, "ERR_WDT attach failed: {err}");
            return Err(err);
        }
        let previous = self.link.lock().replace(Link {
            period,
            reporter: Arc::from(reporter),
            last_kick: Instant::now(),
        });
        if let Some(previous) = previous {
            if let Err(err) = previous.reporter.unregister() {
                module_warn!(self.identity, "ERR_WDT releasing previous reporter: {err}");
            }
        }
        module_debug!(self.identity, "Attached to watchdog, period {} ms", period.as_millis());
        Ok(())
    }

    /// Stops keep-alives. Detaching an unattached heartbeat is a no-op.
    pub fn detach(&self) -> Result<(), LivenessError> {
        let Some(link) = self.link.lock().take() else {
            return Ok(());
        };
        module_debug!(self.identity, "Detached from watchdog");
        link.reporter.unregister()
    }

    pub fn is_attached(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Wait budget for the event source: the period when attached.
    pub fn period(&self) -> Option<Duration> {
        self.link.lock().as_ref().map(|link| link.period)
    }

    /// Kicks the reporter if one is attached. `forced` kicks unconditionally,
    /// otherwise only once a full period has elapsed since the last kick.
    ///
    /// The reporter runs without the link lock held, so keep-alive
    /// subscribers may call back into the module.
    pub fn beat(&self, forced: bool) {
        let reporter = {
            let mut guard = self.link.lock();
            let Some(link) = guard.as_mut() else {
                return;
            };
            if !forced && link.last_kick.elapsed() < link.period {
                return;
            }
            link.last_kick = Instant::now();
            Arc::clone(&link.reporter)
        };
        if let Err(err) = reporter.kick() {
            module_warn!(self.identity, "ERR_WDT keep-alive failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use am_mq::{parse_cstr, LocalBroker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        kicks: AtomicUsize,
        unregistered: AtomicUsize,
    }

    impl LivenessReporter for Arc<Counting> {
        fn register(&self) -> Result<(), LivenessError> {
            Ok(())
        }

        fn kick(&self) -> Result<(), LivenessError> {
            self.kicks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn unregister(&self) -> Result<(), LivenessError> {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn publish_keepalive_sends_component_name() {
        let broker = Arc::new(LocalBroker::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        broker
            .subscribe(
                "sys/keepalive",
                Arc::new(move |_: &str, payload: &[u8]| {
                    sink.lock().push(parse_cstr(payload).map(str::to_owned));
                }),
            )
            .unwrap();

        let reporter = PublishKeepAlive::new(broker.clone(), "sys/keepalive", "Sensor");
        reporter.register().unwrap();
        reporter.kick().unwrap();
        assert_eq!(*seen.lock(), vec![Some("Sensor".to_owned()); 2]);
    }

    #[test]
    fn publish_keepalive_reports_broker_failure() {
        let broker = Arc::new(LocalBroker::new());
        broker.set_available(false);
        let reporter = PublishKeepAlive::new(broker, "sys/keepalive", "Sensor");
        assert!(matches!(reporter.register(), Err(LivenessError::Publish(_))));
    }

    #[test]
    fn unforced_beats_are_paced_by_period() {
        let counting = Arc::new(Counting::default());
        let heartbeat = Heartbeat::new(Identity::new("Pacer", false));
        heartbeat
            .attach(Duration::from_millis(30), Box::new(Arc::clone(&counting)))
            .unwrap();

        heartbeat.beat(false);
        assert_eq!(counting.kicks.load(Ordering::SeqCst), 0);
        heartbeat.beat(true);
        assert_eq!(counting.kicks.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(40));
        heartbeat.beat(false);
        assert_eq!(counting.kicks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn detach_releases_reporter_once() {
        let counting = Arc::new(Counting::default());
        let heartbeat = Heartbeat::new(Identity::new("Pacer", false));
        heartbeat
            .attach(Duration::from_millis(10), Box::new(Arc::clone(&counting)))
            .unwrap();
        assert_eq!(heartbeat.period(), Some(Duration::from_millis(10)));

        heartbeat.detach().unwrap();
        heartbeat.detach().unwrap();
        heartbeat.beat(true);
        assert!(!heartbeat.is_attached());
        assert_eq!(counting.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(counting.kicks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_period_is_rejected_before_registering() {
        let broker = Arc::new(LocalBroker::new());
        let heartbeat = Heartbeat::new(Identity::new("Spinner", false));
        let reporter = PublishKeepAlive::new(broker.clone(), "sys/keepalive", "Spinner");

        let result = heartbeat.attach(Duration::ZERO, Box::new(reporter));
        assert!(matches!(result, Err(LivenessError::ZeroPeriod)));
        assert!(!heartbeat.is_attached());
        assert_eq!(heartbeat.period(), None);
        assert_eq!(broker.published(), 0);
    }

    #[test]
    fn kick_may_reenter_the_heartbeat() {
        let broker = Arc::new(LocalBroker::new());
        let heartbeat = Arc::new(Heartbeat::new(Identity::new("Echo", false)));
        let observed = Arc::new(Mutex::new(Vec::new()));

        let hb = Arc::clone(&heartbeat);
        let sink = Arc::clone(&observed);
        broker
            .subscribe(
                "sys/keepalive",
                Arc::new(move |_: &str, _: &[u8]| {
                    sink.lock().push(hb.is_attached());
                }),
            )
            .unwrap();

        let reporter = PublishKeepAlive::new(broker.clone(), "sys/keepalive", "Echo");
        heartbeat
            .attach(Duration::from_millis(10), Box::new(reporter))
            .unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let beater = Arc::clone(&heartbeat);
        std::thread::spawn(move || {
            beater.beat(true);
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert_eq!(*observed.lock(), vec![false, true]);
    }
}
