//! The [`Module`] capability trait and the context handed to its handlers.

use std::sync::Arc;
use std::time::Duration;

use am_core::{Message, StateContext, StateEvent, StateResult, Transitions};
use am_mq::{topic, BrokerResult, PublishCallback};
use am_nvs::ValueKind;

use crate::error::ModuleResult;
use crate::name::Identity;
use crate::shared::Shared;

/// Where the configuration in effect came from after
/// [`Module::load_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Restored from storage and passed the integrity check.
    Restored,
    /// Restore failed; defaults were applied and saved.
    NotRestored,
    /// Restored data failed the integrity check; defaults were applied and
    /// saved.
    IntegrityFailed,
}

impl ConfigOrigin {
    pub fn is_restored(self) -> bool {
        self == ConfigOrigin::Restored
    }
}

/// Behaviour plugged into an [`ActiveModule`](crate::ActiveModule).
///
/// The module thread owns the implementor. Every method except
/// [`translate`](Module::translate) and
/// [`on_published`](Module::on_published) runs on that thread.
pub trait Module: Send + Sized + 'static {
    /// Handler of the initial state. Receives `ENTRY` once the topic bases
    /// are assigned.
    fn init(&mut self, ctx: &mut ModuleContext<Self>, event: &mut StateEvent) -> StateResult;

    /// Validates the configuration currently held.
    fn check_integrity(&self) -> bool;

    /// Replaces the configuration with built-in defaults.
    fn set_default_config(&mut self);

    fn restore_config(&mut self, ctx: &ModuleContext<Self>) -> bool;

    fn save_config(&self, ctx: &ModuleContext<Self>) -> bool;

    /// Converts a broker publication into a mailbox message. Runs on the
    /// broker's delivery thread; returning `None` drops the publication.
    fn translate(topic: &str, payload: &[u8]) -> Option<Message> {
        let _ = (topic, payload);
        None
    }

    /// Observes the result of a publication made through
    /// [`ModuleContext::publish`]. Runs on the broker's delivery thread.
    fn on_published(topic: &str, result: &BrokerResult<()>) {
        let _ = (topic, result);
    }

    /// Restores the stored configuration, falling back to saved defaults
    /// when restore or the integrity check fails.
    fn load_config(&mut self, ctx: &ModuleContext<Self>) -> ConfigOrigin {
        let origin = if !self.restore_config(ctx) {
            log::warn!("{} ERR_CFG restore failed, applying defaults", ctx.decorated_name());
            ConfigOrigin::NotRestored
        } else if !self.check_integrity() {
            log::warn!("{} ERR_CFG integrity check failed, applying defaults", ctx.decorated_name());
            ConfigOrigin::IntegrityFailed
        } else {
            return ConfigOrigin::Restored;
        };
        self.set_default_config();
        if !self.save_config(ctx) {
            log::warn!("{} ERR_CFG defaults not persisted", ctx.decorated_name());
        }
        origin
    }
}

/// Context passed to every state handler of a module.
pub struct ModuleContext<B> {
    shared: Arc<Shared>,
    transitions: Transitions<B, ModuleContext<B>>,
    published: PublishCallback,
}

impl<B: Module> ModuleContext<B> {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            transitions: Transitions::new(),
            published: Arc::new(|topic: &str, result: &BrokerResult<()>| {
                B::on_published(topic, result)
            }),
        }
    }
}

impl<B> ModuleContext<B> {
    pub fn identity(&self) -> &Identity {
        &self.shared.identity
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

    /// Publication base; always set once the module has started.
    pub fn publication_base(&self) -> &str {
        self.shared.publication_base().unwrap_or_default()
    }

    /// Subscription base; always set once the module has started.
    pub fn subscription_base(&self) -> &str {
        self.shared.subscription_base().unwrap_or_default()
    }

    /// Publishes `payload` on `topic`; the module's
    /// [`on_published`](Module::on_published) hook observes the delivery.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> ModuleResult<()> {
        self.shared.broker.publish(topic, payload, Some(&self.published))?;
        Ok(())
    }

    /// Publishes under the publication base: `<base>/<suffix>`.
    pub fn publish_under(&self, suffix: &str, payload: &[u8]) -> ModuleResult<()> {
        self.publish(&topic::join(self.publication_base(), suffix), payload)
    }

    /// Queues `message` in this module's own mailbox without waiting.
    pub fn post_self(&self, message: Message) -> ModuleResult<()> {
        self.shared.enqueue(message, Duration::ZERO)
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
}

impl<B> StateContext<B> for ModuleContext<B> {
    fn transitions(&mut self) -> &mut Transitions<B, Self> {
        &mut self.transitions
    }
}
