use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use am_core::Message;
use am_mq::{topic, Broker};
use am_nvs::NvStorage;

use crate::config::ModuleConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::liveness::Heartbeat;
use crate::mailbox::{Full, Mailbox};
use crate::name::Identity;

/// State reachable from both the module thread and its producers.
pub(crate) struct Shared {
    pub(crate) identity: Identity,
    pub(crate) put_timeout: Duration,
    pub(crate) start_poll: Duration,
    pub(crate) ready: AtomicBool,
    pub(crate) mailbox: Mailbox<Message>,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) storage: Option<Arc<dyn NvStorage>>,
    in_flight: AtomicUsize,
    pub_base: OnceLock<String>,
    sub_base: OnceLock<String>,
}

impl Shared {
    pub(crate) fn new(
        config: &ModuleConfig,
        broker: Arc<dyn Broker>,
        storage: Option<Arc<dyn NvStorage>>,
    ) -> Self {
        let identity = Identity::new(&config.name, config.debug);
        Self {
            heartbeat: Heartbeat::new(identity.clone()),
            identity,
            put_timeout: config.put_timeout,
            start_poll: config.start_poll,
            ready: AtomicBool::new(false),
            mailbox: Mailbox::new(),
            broker,
            storage,
            in_flight: AtomicUsize::new(0),
            pub_base: OnceLock::new(),
            sub_base: OnceLock::new(),
        }
    }

    /// Queues `message`, waiting up to `timeout` for a free slot.
    pub(crate) fn enqueue(&self, message: Message, timeout: Duration) -> ModuleResult<()> {
        let signal = message.signal();
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        match self.mailbox.put(message, Some(timeout)) {
            Ok(()) => Ok(()),
            Err(Full(_)) => {
                self.release_in_flight();
                module_error!(self.identity, "ERR_PUT mailbox full, message {signal} dropped");
                Err(ModuleError::ResourceExhaustion(signal))
            }
        }
    }

    /// Decrements the in-flight count, never below zero.
    pub(crate) fn release_in_flight(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn set_publication_base(&self, base: &str) -> ModuleResult<()> {
        topic::validate_topic(base)?;
        self.pub_base
            .set(base.to_string())
            .map_err(|_| ModuleError::TopicBaseAlreadySet)?;
        module_debug!(self.identity, "Publication base: {base}");
        Ok(())
    }

    pub(crate) fn set_subscription_base(&self, base: &str) -> ModuleResult<()> {
        topic::validate_filter(base)?;
        self.sub_base
            .set(base.to_string())
            .map_err(|_| ModuleError::TopicBaseAlreadySet)?;
        module_debug!(self.identity, "Subscription base: {base}");
        Ok(())
    }

    pub(crate) fn publication_base(&self) -> Option<&str> {
        self.pub_base.get().map(String::as_str)
    }

    pub(crate) fn subscription_base(&self) -> Option<&str> {
        self.sub_base.get().map(String::as_str)
    }

    pub(crate) fn bases_assigned(&self) -> bool {
        self.pub_base.get().is_some() && self.sub_base.get().is_some()
    }
}
