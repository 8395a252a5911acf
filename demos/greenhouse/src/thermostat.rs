//! Thermostat module: two-point heater control around a persisted setpoint.

use std::thread;
use std::time::Duration;

use am_active::{
    Message, Module, ModuleContext, Signal, State, StateContext, StateEvent, StateResult,
    ValueKind,
};
use am_mq::{parse_cstr, topic, BrokerResult};
use serde::{Deserialize, Serialize};

pub const TEMPERATURE_SIG: Signal = Signal(Signal::USER.0);
pub const SETPOINT_SIG: Signal = Signal(Signal::USER.0 + 1);
pub const STALL_SIG: Signal = Signal(Signal::USER.0 + 2);

const CONFIG_KEY: &str = "thermo_cfg";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatConfig {
    pub setpoint: f32,
    pub hysteresis: f32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            setpoint: 21.0,
            hysteresis: 0.5,
        }
    }
}

impl ThermostatConfig {
    const ENCODED_LEN: usize = 8;

    fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..4].copy_from_slice(&self.setpoint.to_le_bytes());
        out[4..].copy_from_slice(&self.hysteresis.to_le_bytes());
        out
    }

    fn from_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        let [a, b, c, d, e, f, g, h] = bytes;
        Self {
            setpoint: f32::from_le_bytes([a, b, c, d]),
            hysteresis: f32::from_le_bytes([e, f, g, h]),
        }
    }

    pub fn is_valid(&self) -> bool {
        (5.0..=40.0).contains(&self.setpoint) && (0.1..=5.0).contains(&self.hysteresis)
    }
}

/// Published on `<publication base>/status`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// `None` until the first reading arrives.
    pub temperature: Option<f32>,
    pub setpoint: f32,
    pub heating: bool,
}

pub struct Thermostat {
    config: ThermostatConfig,
    requested_setpoint: Option<f32>,
    temperature: Option<f32>,
}

type Ctx = ModuleContext<Thermostat>;

const IDLE: State<Thermostat, Ctx> = State::new("Idle", idle);
const HEATING: State<Thermostat, Ctx> = State::new("Heating", heating);

impl Thermostat {
    /// `setpoint` overrides the stored one once the configuration is loaded.
    pub fn new(setpoint: Option<f32>) -> Self {
        Self {
            config: ThermostatConfig::default(),
            requested_setpoint: setpoint,
            temperature: None,
        }
    }

    fn apply_setpoint(&mut self, ctx: &Ctx, setpoint: f32) {
        let candidate = ThermostatConfig {
            setpoint,
            ..self.config
        };
        if !candidate.is_valid() {
            log::warn!("{} ERR_CFG setpoint {setpoint} out of range", ctx.decorated_name());
            return;
        }
        self.config = candidate;
        if !self.save_config(ctx) {
            log::warn!("{} setpoint {setpoint} applied but not persisted", ctx.decorated_name());
        }
    }

    fn report(&self, ctx: &Ctx, heating: bool) {
        let status = Status {
            temperature: self.temperature,
            setpoint: self.config.setpoint,
            heating,
        };
        match serde_json::to_vec(&status) {
            Ok(json) => {
                let _ = ctx.publish_under("status", &json);
            }
            Err(err) => log::warn!("{} ERR_JSON {err}", ctx.decorated_name()),
        }
    }

    /// Events handled the same way in every operating state.
    fn common(&mut self, ctx: &mut Ctx, ev: &mut StateEvent, heating: bool) -> StateResult {
        match ev.signal() {
            SETPOINT_SIG => {
                if let Some(setpoint) = ev.take_payload::<f32>() {
                    self.apply_setpoint(ctx, setpoint);
                    self.report(ctx, heating);
                }
                StateResult::Handled
            }
            STALL_SIG => {
                let millis = ev.take_payload::<u64>().unwrap_or(0);
                log::warn!("{} stalling for {millis} ms", ctx.decorated_name());
                thread::sleep(Duration::from_millis(millis));
                StateResult::Handled
            }
            _ => StateResult::Ignored,
        }
    }

    fn take_temperature(&mut self, ev: &mut StateEvent) -> Option<f32> {
        let value = ev.take_payload::<f32>()?;
        self.temperature = Some(value);
        Some(value)
    }
}

fn idle(t: &mut Thermostat, ctx: &mut Ctx, ev: &mut StateEvent) -> StateResult {
    match ev.signal() {
        Signal::ENTRY => {
            if ctx.debug_active() {
                log::info!("{} heater off", ctx.decorated_name());
            }
            StateResult::Handled
        }
        TEMPERATURE_SIG => {
            if let Some(reading) = t.take_temperature(ev) {
                t.report(ctx, false);
                if reading < t.config.setpoint - t.config.hysteresis {
                    ctx.tran_state(HEATING);
                }
            }
            StateResult::Handled
        }
        _ => t.common(ctx, ev, false),
    }
}

fn heating(t: &mut Thermostat, ctx: &mut Ctx, ev: &mut StateEvent) -> StateResult {
    match ev.signal() {
        Signal::ENTRY => {
            if ctx.debug_active() {
                log::info!("{} heater on", ctx.decorated_name());
            }
            t.report(ctx, true);
            StateResult::Handled
        }
        TEMPERATURE_SIG => {
            if let Some(reading) = t.take_temperature(ev) {
                if reading > t.config.setpoint + t.config.hysteresis {
                    ctx.tran_state(IDLE);
                } else {
                    t.report(ctx, true);
                }
            }
            StateResult::Handled
        }
        Signal::EXIT => {
            t.report(ctx, false);
            StateResult::Ignored
        }
        _ => t.common(ctx, ev, true),
    }
}

impl Module for Thermostat {
    fn init(&mut self, ctx: &mut Ctx, ev: &mut StateEvent) -> StateResult {
        if ev.signal() != Signal::ENTRY {
            return StateResult::Ignored;
        }
        let origin = self.load_config(ctx);
        log::info!(
            "{} configuration {:?}: setpoint {:.1}, hysteresis {:.1}",
            ctx.decorated_name(),
            origin,
            self.config.setpoint,
            self.config.hysteresis
        );
        if let Some(setpoint) = self.requested_setpoint.take() {
            self.apply_setpoint(ctx, setpoint);
        }
        ctx.tran_state(IDLE);
        StateResult::Handled
    }

    fn check_integrity(&self) -> bool {
        self.config.is_valid()
    }

    fn set_default_config(&mut self) {
        self.config = ThermostatConfig::default();
    }

    fn restore_config(&mut self, ctx: &Ctx) -> bool {
        let mut buf = [0u8; ThermostatConfig::ENCODED_LEN];
        if !ctx.restore_parameter(CONFIG_KEY, &mut buf, ValueKind::Blob) {
            return false;
        }
        self.config = ThermostatConfig::from_bytes(buf);
        true
    }

    fn save_config(&self, ctx: &Ctx) -> bool {
        ctx.save_parameter(CONFIG_KEY, &self.config.to_bytes(), ValueKind::Blob)
    }

    fn translate(topic: &str, payload: &[u8]) -> Option<Message> {
        let text = parse_cstr(payload)?;
        if topic::is_token(topic, "/temperature") {
            let value = text.trim().parse::<f32>().ok()?;
            return Some(Message::with_payload(TEMPERATURE_SIG, value));
        }
        if topic::is_token(topic, "/setpoint/cmd") {
            let value = text.trim().parse::<f32>().ok()?;
            return Some(Message::with_payload(SETPOINT_SIG, value));
        }
        if topic::is_token(topic, "/stall/cmd") {
            let millis = text.trim().parse::<u64>().ok()?;
            return Some(Message::with_payload(STALL_SIG, millis));
        }
        None
    }

    fn on_published(topic: &str, result: &BrokerResult<()>) {
        if let Err(err) = result {
            log::warn!("publish to {topic} failed: {err}");
        }
    }
}
