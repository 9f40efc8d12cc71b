//! Console demo: one loopback teletype shared by several sessions.
//!
//! Run with: cargo run -p ttymux-console
//!
//! Plain lines are typed on TTY0. `:spawn` opens another session,
//! `:send N text` types on it, and its output is printed with a `[TTYn]`
//! prefix. `:kill N` crashes a session so the liveness poll reclaims it.

mod command;
mod device;
mod surface;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ttymux_core::{Bus, ContextLauncher, Device, LocalBus, MAX_UNITS, MuxConfig, Unit};
use ttymux_session::SpawnError;
use ttymux_transport::{PrimaryContext, SessionIo, TaskLauncher, WireBus};

use crate::{
    command::{Command, HELP},
    device::LoopbackDevice,
    surface::{ConsoleSurface, LabeledSurface},
};

type Keyboards = Arc<Mutex<HashMap<Unit, mpsc::UnboundedSender<String>>>>;

#[derive(Debug, Parser)]
#[command(name = "ttymux-console", about = "Share one teletype across sessions")]
struct Args {
    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Carry bus messages as encoded JSON frames.
    #[arg(long)]
    wire: bool,

    /// Refuse to launch more than this many sessions at once.
    #[arg(long)]
    max_contexts: Option<usize>,

    /// Log filter, overrides RUST_LOG.
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let config = match &args.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            MuxConfig::from_json(&text)?
        }
        None => MuxConfig::default(),
    };

    let bus: Arc<dyn Bus> = if args.wire {
        Arc::new(WireBus::new(config.bus_capacity))
    } else {
        Arc::new(LocalBus::new(config.bus_capacity))
    };

    let keyboards: Keyboards = Arc::default();
    let mut launcher = TaskLauncher::new(
        Arc::clone(&bus),
        config.clone(),
        session_io_factory(Arc::clone(&keyboards), config.label_prefix.clone()),
    );
    if let Some(limit) = args.max_contexts {
        launcher = launcher.with_limit(limit);
    }
    let launcher = Arc::new(launcher);

    let (device, device_output) = LoopbackDevice::open();
    let device = Arc::new(device);
    let primary = PrimaryContext::new(
        bus,
        Arc::clone(&device) as Arc<dyn Device>,
        Arc::new(ConsoleSurface),
        Arc::clone(&launcher) as Arc<dyn ContextLauncher>,
        &config,
    )?;
    let spawner = primary.spawner();
    let registry = primary.registry();

    let (local_keys, local_rx) = mpsc::unbounded_channel();
    let primary_task = tokio::spawn(primary.run(
        UnboundedReceiverStream::new(device_output),
        UnboundedReceiverStream::new(local_rx),
    ));

    println!("{HELP}");
    device.greet(Unit::PRIMARY);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Spawn(unit) => match spawner.spawn(unit).await {
                Ok(unit) => {
                    println!("spawned {}", registry.label(unit));
                    device.greet(unit);
                }
                Err(SpawnError::CapacityExhausted) => {
                    println!("all {MAX_UNITS} units are busy; close one first");
                }
                Err(e) => println!("spawn failed: {e}"),
            },
            Command::Close(unit) => match spawner.close(unit) {
                Ok(()) => println!("closed {}", registry.label(unit)),
                Err(e) => println!("close failed: {e}"),
            },
            Command::Kill(unit) => {
                if launcher.kill(unit) {
                    println!("killed {}; waiting for the liveness poll", registry.label(unit));
                } else {
                    println!("no running session on {}", registry.label(unit));
                }
            }
            Command::Units => {
                let owned = spawner.owned_units();
                for session in registry.sessions() {
                    let state = match (session.is_primary, session.in_use) {
                        (true, _) => "primary",
                        (false, true) if owned.contains(&session.unit) => "active (spawned here)",
                        (false, true) => "active",
                        (false, false) => "free",
                    };
                    println!("{:>6}  {state}", session.label);
                }
            }
            Command::Send(unit, text) => {
                let sent = keyboards
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&unit)
                    .is_some_and(|tx| tx.send(format!("{text}\r")).is_ok());
                if !sent {
                    println!("no keyboard attached to {}", registry.label(unit));
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Type(text) => {
                if local_keys.send(format!("{text}\r")).is_err() {
                    break;
                }
            }
        }
    }

    drop(local_keys);
    primary_task.await.context("primary context panicked")?;
    Ok(())
}

/// Each spawned session gets a labeled stdout surface and a keyboard fed
/// by `:send`.
fn session_io_factory(
    keyboards: Keyboards,
    label_prefix: String,
) -> ttymux_transport::SessionIoFactory {
    Arc::new(move |unit: Unit| {
        let (tx, rx) = mpsc::unbounded_channel();
        keyboards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unit, tx);
        SessionIo {
            surface: Arc::new(LabeledSurface::new(unit.label(&label_prefix))),
            keystrokes: UnboundedReceiverStream::new(rx).boxed(),
        }
    })
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter.map_or_else(
        || {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into())
        },
        tracing_subscriber::EnvFilter::new,
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
