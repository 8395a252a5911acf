//! Periodic timer backed by a dedicated thread.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Control {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Calls a tick function once per period until stopped.
///
/// [`stop`](PeriodicTimer::stop) only prevents future ticks; a tick already
/// running completes. The timer never joins its thread, so it may be stopped
/// from inside its own tick.
pub struct PeriodicTimer {
    control: Arc<Control>,
    period: Duration,
}

impl PeriodicTimer {
    pub fn start<F>(name: &str, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let control = Arc::new(Control {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&control);
        thread::Builder::new()
            .name(format!("{name}-timer"))
            .spawn(move || {
                let mut next = Instant::now() + period;
                loop {
                    {
                        let mut stopped = worker.stopped.lock();
                        while !*stopped {
                            if worker.wake.wait_until(&mut stopped, next).timed_out() {
                                break;
                            }
                        }
                        if *stopped {
                            return;
                        }
                    }
                    tick();
                    next += period;
                    let now = Instant::now();
                    if next <= now {
                        next = now + period;
                    }
                }
            })?;
        Ok(Self { control, period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stop(&self) {
        *self.control.stopped.lock() = true;
        self.control.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.control.stopped.lock()
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = PeriodicTimer::start("test", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(75));
        timer.stop();
        assert!(timer.is_stopped());
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 3, "only {seen} ticks");

        thread::sleep(Duration::from_millis(40));
        assert!(ticks.load(Ordering::SeqCst) <= seen + 1);
    }

    #[test]
    fn drop_stops_timer() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = PeriodicTimer::start("drop", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(timer.period(), Duration::from_millis(10));
        drop(timer);
        thread::sleep(Duration::from_millis(40));
        assert!(ticks.load(Ordering::SeqCst) <= 1);
    }
}
