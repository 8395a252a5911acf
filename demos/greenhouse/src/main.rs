mod logger;
mod sim;
mod thermostat;

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use am_active::{ActiveModule, ModuleConfig, ThreadPriority};
use am_mq::{cstr_payload, parse_cstr, Broker, LocalBroker};
use am_nvs::{DirStorage, MemoryStorage, NvStorage};
use am_watchdog::{TaskWatchdog, WatchdogConfig, DEFAULT_KEEPALIVE_TOPIC};
use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use crate::sim::Environment;
use crate::thermostat::Thermostat;

const PUB_BASE: &str = "stat/greenhouse";
const SUB_BASE: &str = "set/greenhouse";

#[derive(Parser, Debug)]
#[command(author, version, about = "Greenhouse thermostat under watchdog supervision")]
struct Opts {
    /// Directory holding persisted parameters; in-memory when omitted.
    #[arg(long, value_name = "DIR")]
    storage: Option<PathBuf>,

    /// Overrides the stored setpoint (°C).
    #[arg(long)]
    setpoint: Option<f32>,

    /// Outside temperature the air drifts toward (°C).
    #[arg(long, default_value_t = 12.0)]
    outside: f32,

    /// Run time in seconds.
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Watchdog sweep period in milliseconds.
    #[arg(long = "watchdog-ms", default_value_t = 1000)]
    watchdog_ms: u32,

    /// Keep-alive period of the thermostat in milliseconds.
    #[arg(long = "keepalive-ms", default_value_t = 250)]
    keepalive_ms: u32,

    /// Grace delay between a timeout and the fail-safe action.
    #[arg(long = "grace-ms", default_value_t = 200)]
    grace_ms: u32,

    /// Simulation step in milliseconds.
    #[arg(long = "tick-ms", default_value_t = 200)]
    tick_ms: u64,

    /// Stall the thermostat after this many seconds to exercise the watchdog.
    #[arg(long = "stall-after", value_name = "SECS")]
    stall_after: Option<u64>,

    /// Print status and fault publications as JSON lines on stdout.
    #[arg(long)]
    json: bool,

    /// Enable module debug output.
    #[arg(long)]
    debug: bool,

    #[arg(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logger::init(opts.log_level)?;

    let broker: Arc<dyn Broker> = Arc::new(LocalBroker::new());
    let storage: Arc<dyn NvStorage> = match &opts.storage {
        Some(dir) => Arc::new(
            DirStorage::new(dir).with_context(|| format!("opening storage {}", dir.display()))?,
        ),
        None => Arc::new(MemoryStorage::new()),
    };

    if opts.json {
        echo_json(&broker)?;
    }

    let watchdog = TaskWatchdog::new(
        WatchdogConfig::builder()
            .name("greenhouse")
            .keepalive_topic(DEFAULT_KEEPALIVE_TOPIC)
            .debug(opts.debug)
            .build(),
        Arc::clone(&broker),
    );
    let (reset_tx, reset_rx) = mpsc::channel();
    watchdog.attach_timeout_callback(opts.grace_ms, move || {
        let _ = reset_tx.send(());
    });
    watchdog.start(opts.watchdog_ms)?;

    let thermostat = ActiveModule::new(
        ModuleConfig::builder()
            .name("Thermostat")
            .priority(ThreadPriority::AboveNormal)
            .debug(opts.debug)
            .build(),
        Arc::clone(&broker),
        Some(storage),
        Thermostat::new(opts.setpoint),
    )?;
    thermostat.set_publication_base(PUB_BASE)?;
    thermostat.set_subscription_base(&format!("{SUB_BASE}/#"))?;
    thermostat.subscribe(&format!("{SUB_BASE}/#"))?;
    thermostat.attach_to_watchdog(opts.keepalive_ms, DEFAULT_KEEPALIVE_TOPIC, "Thermostat")?;

    let mut air = Environment::spawn(
        Arc::clone(&broker),
        &format!("{PUB_BASE}/status"),
        &format!("{SUB_BASE}/temperature"),
        opts.outside,
        Duration::from_millis(opts.tick_ms),
    )?;

    if let Some(secs) = opts.stall_after {
        let broker = Arc::clone(&broker);
        let stall_ms = u64::from(opts.watchdog_ms) * 3;
        thread::Builder::new().name("stall".into()).spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            let _ = broker.publish(
                &format!("{SUB_BASE}/stall/cmd"),
                &cstr_payload(&stall_ms.to_string()),
                None,
            );
        })?;
    }

    let outcome = reset_rx.recv_timeout(Duration::from_secs(opts.duration));
    air.stop();
    watchdog.stop();

    log::info!(
        "thermostat diagnostics: max queue depth {}, in flight {}",
        thermostat.max_queue_depth(),
        thermostat.in_flight()
    );
    match outcome {
        Ok(()) => {
            log::error!("fail-safe triggered by watchdog timeout");
            std::process::exit(2);
        }
        Err(RecvTimeoutError::Timeout) => log::info!("run complete"),
        Err(RecvTimeoutError::Disconnected) => anyhow::bail!("watchdog dropped its callback"),
    }
    Ok(())
}

fn echo_json(broker: &Arc<dyn Broker>) -> anyhow::Result<()> {
    broker.subscribe(
        &format!("{PUB_BASE}/status"),
        Arc::new(|topic: &str, payload: &[u8]| {
            if let Ok(status) = serde_json::from_slice::<serde_json::Value>(payload) {
                println!("{}", serde_json::json!({ "topic": topic, "status": status }));
            }
        }),
    )?;
    broker.subscribe(
        "stat/timeout/+",
        Arc::new(|topic: &str, payload: &[u8]| {
            let silent: Vec<&str> = parse_cstr(payload)
                .map(|list| list.split(',').collect())
                .unwrap_or_default();
            println!("{}", serde_json::json!({ "topic": topic, "timeout": silent }));
        }),
    )?;
    Ok(())
}
