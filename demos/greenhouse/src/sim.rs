//! Simulated greenhouse air: drifts toward the outside temperature and
//! warms up while the heater is on.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use am_mq::{cstr_payload, Broker, SubscriptionId};

use crate::thermostat::Status;

const HEATER_GAIN: f32 = 0.4;
const LOSS_FACTOR: f32 = 0.05;

pub struct Environment {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    broker: Arc<dyn Broker>,
    subscription: SubscriptionId,
}

impl Environment {
    pub fn spawn(
        broker: Arc<dyn Broker>,
        status_topic: &str,
        temperature_topic: &str,
        outside: f32,
        tick: Duration,
    ) -> anyhow::Result<Self> {
        let heating = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let heater = Arc::clone(&heating);
        let subscription = broker.subscribe(
            status_topic,
            Arc::new(move |_: &str, payload: &[u8]| {
                if let Ok(status) = serde_json::from_slice::<Status>(payload) {
                    heater.store(status.heating, Ordering::Relaxed);
                }
            }),
        )?;

        let thread = spawn_air(
            Arc::clone(&broker),
            temperature_topic.to_string(),
            Arc::clone(&running),
            heating,
            outside,
            tick,
        )?;

        Ok(Self {
            running,
            thread: Some(thread),
            broker,
            subscription,
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = self.broker.unsubscribe(self.subscription);
    }
}

fn spawn_air(
    broker: Arc<dyn Broker>,
    topic: String,
    running: Arc<AtomicBool>,
    heating: Arc<AtomicBool>,
    outside: f32,
    tick: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("air".into()).spawn(move || {
        let mut air = outside;
        while running.load(Ordering::Relaxed) {
            air += (outside - air) * LOSS_FACTOR;
            if heating.load(Ordering::Relaxed) {
                air += HEATER_GAIN;
            }
            let reading = format!("{air:.2}");
            if let Err(err) = broker.publish(&topic, &cstr_payload(&reading), None) {
                log::warn!("[air] publish failed: {err}");
            }
            thread::sleep(tick);
        }
    })
}
