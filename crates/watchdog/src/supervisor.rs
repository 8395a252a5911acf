//! Task watchdog supervisor.
//!
//! ```text
//!          start(t)                         stop()
//!  Stopped ────────► Running ──────────────────────► Stopped
//!     ▲  subscribe ok   │ every t: sweep registry
//!     └─ subscribe err  │ silent? publish stat/timeout/<name>
//!                       ▼         then pre-wait + callback (once per episode)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use am_mq::{cstr_payload, parse_cstr, Broker, SubscribeCallback, SubscriptionId};
use parking_lot::Mutex;

use crate::config::WatchdogConfig;
use crate::registry::LivenessRegistry;
use crate::timer::PeriodicTimer;
use crate::{WatchdogError, WatchdogResult};

/// Fail-safe action run after a fault has been published.
pub type TimeoutCallback = Arc<dyn Fn() + Send + Sync>;

struct Reaction {
    pre_wait: Duration,
    callback: TimeoutCallback,
}

struct Inner {
    config: WatchdogConfig,
    prefix: String,
    fault_topic: String,
    broker: Arc<dyn Broker>,
    registry: LivenessRegistry,
    reaction: Mutex<Option<Reaction>>,
    in_fault: AtomicBool,
}

enum RunState {
    Stopped,
    Running {
        timer: PeriodicTimer,
        subscription: SubscriptionId,
    },
}

pub struct TaskWatchdog {
    inner: Arc<Inner>,
    run: Mutex<RunState>,
    timeout_ms: AtomicU32,
}

impl TaskWatchdog {
    pub fn new(config: WatchdogConfig, broker: Arc<dyn Broker>) -> Self {
        let prefix = format!("[{}]", config.name);
        let fault_topic = config.fault_topic();
        Self {
            inner: Arc::new(Inner {
                config,
                prefix,
                fault_topic,
                broker,
                registry: LivenessRegistry::new(),
                reaction: Mutex::new(None),
                in_fault: AtomicBool::new(false),
            }),
            run: Mutex::new(RunState::Stopped),
            timeout_ms: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn fault_topic(&self) -> &str {
        &self.inner.fault_topic
    }

    /// Clears the registry, subscribes to the keep-alive topic and starts
    /// sweeping every `timeout_ms`. Calling it while running restarts the
    /// supervisor with the new period.
    pub fn start(&self, timeout_ms: u32) -> WatchdogResult<()> {
        if timeout_ms == 0 {
            return Err(WatchdogError::ZeroTimeout);
        }
        let mut run = self.run.lock();
        self.inner.release(&mut run);
        self.inner.registry.clear();
        self.inner.in_fault.store(false, Ordering::Release);

        let listener = Arc::downgrade(&self.inner);
        let callback: SubscribeCallback = Arc::new(move |_topic: &str, payload: &[u8]| {
            if let Some(inner) = listener.upgrade() {
                inner.on_keepalive(payload);
            }
        });
        let subscription = match self
            .inner
            .broker
            .subscribe(&self.inner.config.keepalive_topic, callback)
        {
            Ok(id) => id,
            Err(err) => {
                log::error!("{} ERR_SUBSCRIBE {}: {err}", self.inner.prefix, self.inner.config.keepalive_topic);
                return Err(err.into());
            }
        };

        let sweeper: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = Duration::from_millis(u64::from(timeout_ms));
        let timer = match PeriodicTimer::start(&self.inner.config.name, period, move || {
            if let Some(inner) = sweeper.upgrade() {
                inner.sweep();
            }
        }) {
            Ok(timer) => timer,
            Err(err) => {
                log::error!("{} ERR_TIMER {err}", self.inner.prefix);
                let _ = self.inner.broker.unsubscribe(subscription);
                return Err(err.into());
            }
        };

        self.timeout_ms.store(timeout_ms, Ordering::Release);
        *run = RunState::Running {
            timer,
            subscription,
        };
        log::info!(
            "{} Started, timeout {timeout_ms} ms on {}",
            self.inner.prefix,
            self.inner.config.keepalive_topic
        );
        Ok(())
    }

    /// Stops sweeping and clears the registry. Safe to call when stopped.
    pub fn stop(&self) {
        let mut run = self.run.lock();
        if self.inner.release(&mut run) {
            log::info!("{} Stopped", self.inner.prefix);
        }
        self.inner.registry.clear();
    }

    /// After each faulty sweep that starts a fault episode, waits `pre_wait_ms`
    /// and then runs `callback` on the timer thread.
    pub fn attach_timeout_callback<F>(&self, pre_wait_ms: u32, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.reaction.lock() = Some(Reaction {
            pre_wait: Duration::from_millis(u64::from(pre_wait_ms)),
            callback: Arc::new(callback),
        });
    }

    /// Sweep period of the last successful start, in milliseconds.
    pub fn timeout(&self) -> u32 {
        self.timeout_ms.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.run.lock(), RunState::Running { .. })
    }

    pub fn registry(&self) -> &LivenessRegistry {
        &self.inner.registry
    }

    /// Runs one sweep now and returns the silent components.
    pub fn sweep(&self) -> Vec<String> {
        self.inner.sweep()
    }
}

impl Drop for TaskWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    /// Stops the timer and drops the subscription. Returns `true` if the
    /// supervisor was running.
    fn release(&self, run: &mut RunState) -> bool {
        match std::mem::replace(run, RunState::Stopped) {
            RunState::Stopped => false,
            RunState::Running {
                timer,
                subscription,
            } => {
                timer.stop();
                if let Err(err) = self.broker.unsubscribe(subscription) {
                    log::warn!("{} ERR_UNSUBSCRIBE {err}", self.prefix);
                }
                true
            }
        }
    }

    fn on_keepalive(&self, payload: &[u8]) {
        let Some(component) = parse_cstr(payload) else {
            return;
        };
        if self.registry.notify(component) {
            if self.config.debug {
                log::info!("{} Registered component {component}", self.prefix);
            }
        } else if self.config.debug {
            log::debug!("{} Keep-alive from {component}", self.prefix);
        }
    }

    fn sweep(&self) -> Vec<String> {
        let silent = self.registry.sweep();
        if silent.is_empty() {
            self.in_fault.store(false, Ordering::Release);
            return silent;
        }

        let list = silent.join(",");
        log::warn!("{} Timeout: {list}", self.prefix);
        if let Err(err) = self.broker.publish(&self.fault_topic, &cstr_payload(&list), None) {
            log::warn!("{} ERR_PUBLISH {}: {err}", self.prefix, self.fault_topic);
        }

        let episode_start = !self.in_fault.swap(true, Ordering::AcqRel);
        if episode_start {
            let reaction = self
                .reaction
                .lock()
                .as_ref()
                .map(|r| (r.pre_wait, Arc::clone(&r.callback)));
            if let Some((pre_wait, callback)) = reaction {
                if !pre_wait.is_zero() {
                    thread::sleep(pre_wait);
                }
                callback();
            }
        }
        silent
    }
}
