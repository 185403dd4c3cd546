//! Desktop simulator for the baro-link sampling and notification pipeline.
//!
//! Runs [`TelemetryNode`] against a synthetic barometer and a scripted
//! central in simulated time (one loop iteration per millisecond), and
//! prints the frames the central receives as CSV rows, the way the
//! receiving client logs them.
//!
//! ```text
//! RUST_LOG=info baro-link-simulator --duration-ms 2000 --cts-failures 2
//! ```

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use embassy_futures::block_on;
use log::{error, info, warn};

use baro_link_core::frame::{self, CSV_HEADER};
use baro_link_core::link::{ConnHandle, LinkError, NotifyLink};
use baro_link_core::sensors::{Sensor, SensorError, SensorReading};
use baro_link_core::time_sync::{SyncAction, SyncEvent};
use baro_link_core::work::{SampleQueue, SampleTick, submit};
use baro_link_core::{CurrentTime, DeviceId, NodeConfig, ReferenceClock, TelemetryNode};

/// Attribute handle the scripted central reports for its Current Time characteristic.
const CTS_HANDLE: u16 = 0x0021;

/// Simulated latency of one GATT request.
const REQUEST_LATENCY_MS: u64 = 30;

/// Delay before the central reconnects after a scripted disconnect.
const RECONNECT_DELAY_MS: u64 = 200;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "baro-link-simulator", version, about)]
struct Cli {
    /// Simulated run time in milliseconds
    #[arg(long, default_value_t = 1000)]
    duration_ms: u64,

    /// Device id written into frames (overrides the config file)
    #[arg(long, env = "BARO_DEVICE_ID")]
    device_id: Option<u8>,

    /// Postcard config blob; written with defaults if it does not exist
    #[arg(long)]
    config: Option<PathBuf>,

    /// When the central connects, in simulated milliseconds
    #[arg(long, default_value_t = 100)]
    connect_at_ms: u64,

    /// Disconnect the central at this time, then reconnect shortly after
    #[arg(long)]
    disconnect_at_ms: Option<u64>,

    /// Number of discovery attempts the central fails before answering
    #[arg(long, default_value_t = 0)]
    cts_failures: u8,

    /// The central does not expose a Current Time Service
    #[arg(long)]
    no_cts: bool,

    /// The central never enables notifications
    #[arg(long)]
    no_subscribe: bool,

    /// Every Nth sensor read reports no new data (0 = never)
    #[arg(long, default_value_t = 0)]
    not_ready_every: u32,

    /// Pace the simulation against the wall clock
    #[arg(long)]
    realtime: bool,
}

// ---------------------------------------------------------------------------
// Synthetic barometer
// ---------------------------------------------------------------------------

/// Generates pressure that drifts slowly around standard sea-level pressure.
struct MockBarometer {
    reads: u32,
    not_ready_every: u32,
}

impl MockBarometer {
    fn new(not_ready_every: u32) -> Self {
        Self {
            reads: 0,
            not_ready_every,
        }
    }
}

impl Sensor for MockBarometer {
    async fn init(&mut self) -> Result<(), SensorError> {
        info!("Mock barometer ready");
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        self.reads += 1;
        if self.not_ready_every != 0 && self.reads % self.not_ready_every == 0 {
            return Err(SensorError::NotReady);
        }

        let t = self.reads as f64 * 0.02;
        // 101325 Pa ± ~40 Pa, a walk up and down a flight of stairs
        let pressure = 101_325.0 + 40.0 * (t / 3.0).sin() + 3.0 * (t * 7.0).cos();
        let temperature = 21.5 + 0.5 * (t / 30.0).sin();

        Ok(SensorReading {
            pressure_pa: pressure as u32,
            temperature_milli_celsius: (temperature * 1000.0) as i32,
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted central
// ---------------------------------------------------------------------------

/// Receives notifications and logs them as CSV rows.
#[derive(Default)]
struct CentralLink {
    /// What a GATT read of the frame characteristic would return
    value: Vec<u8>,
    received: usize,
    rejected: usize,
}

impl NotifyLink for CentralLink {
    fn set_value(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        self.value.clear();
        self.value.extend_from_slice(payload);
        Ok(())
    }

    async fn notify(&mut self, _conn: ConnHandle, payload: &[u8]) -> Result<(), LinkError> {
        match frame::decode(payload) {
            Ok(fields) => {
                self.received += 1;
                println!("{}", fields.to_csv_row());
                Ok(())
            }
            Err(e) => {
                self.rejected += 1;
                warn!("Central dropped malformed frame: {}", e);
                Err(LinkError::MalformedValue)
            }
        }
    }
}

/// Wall-clock time of day as the central's Current Time characteristic would report it.
fn wall_clock_time() -> CurrentTime {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs_of_day = now.as_secs() % 86_400;

    CurrentTime {
        year: 1970 + (now.as_secs() / 31_556_952) as u16,
        month: 1,
        day: 1,
        hours: (secs_of_day / 3600) as u8,
        minutes: (secs_of_day / 60 % 60) as u8,
        seconds: (secs_of_day % 60) as u8,
        day_of_week: 0,
        fractions256: (now.subsec_nanos() as u64 * 256 / 1_000_000_000) as u8,
        adjust_reason: 0,
    }
}

/// Answers the node's sync requests after a fixed latency.
struct ScriptedCentral {
    has_cts: bool,
    failures_left: u8,
    pending: VecDeque<(u64, SyncEvent<u16>)>,
}

impl ScriptedCentral {
    fn new(has_cts: bool, failures: u8) -> Self {
        Self {
            has_cts,
            failures_left: failures,
            pending: VecDeque::new(),
        }
    }

    /// React to the action the node asked for.
    fn request(&mut self, now_ms: u64, action: SyncAction<u16>) {
        let due = now_ms + REQUEST_LATENCY_MS;
        let event = match action {
            SyncAction::StartDiscovery | SyncAction::RetryDiscovery { .. } => {
                if !self.has_cts {
                    SyncEvent::DiscoveryNotFound
                } else if self.failures_left > 0 {
                    self.failures_left -= 1;
                    SyncEvent::DiscoveryError(LinkError::Att(0x0e))
                } else {
                    SyncEvent::DiscoveryOk(CTS_HANDLE)
                }
            }
            SyncAction::ReadCurrentTime(_) => SyncEvent::ReadOk(wall_clock_time()),
            SyncAction::None | SyncAction::SetClock(_) | SyncAction::Abandon(_) => return,
        };
        self.pending.push_back((due, event));
    }

    /// Next response that is due at `now_ms`.
    fn poll(&mut self, now_ms: u64) -> Option<SyncEvent<u16>> {
        if self.pending.front().is_some_and(|(due, _)| *due <= now_ms) {
            self.pending.pop_front().map(|(_, event)| event)
        } else {
            None
        }
    }

    /// A disconnect cancels everything in flight.
    fn drop_pending(&mut self) {
        self.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli) -> Result<NodeConfig, String> {
    let mut config = match &cli.config {
        Some(path) if path.exists() => {
            let bytes = fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            NodeConfig::from_bytes(&bytes).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        Some(path) => {
            let config = NodeConfig::default();
            let bytes = config.to_bytes().map_err(|e| e.to_string())?;
            fs::write(path, bytes).map_err(|e| format!("{}: {}", path.display(), e))?;
            info!("Wrote default config to {}", path.display());
            config
        }
        None => NodeConfig::default(),
    };

    if let Some(id) = cli.device_id {
        let device_id =
            DeviceId::new(id).ok_or_else(|| format!("device id {} is not a single digit", id))?;
        config.device_id = device_id;
        config.device_name = NodeConfig::for_device(device_id).device_name;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Simulating {} for {} ms (sample period {} ms)",
        config.device_name, cli.duration_ms, config.sampling.period_ms
    );

    let clock = ReferenceClock::new();
    let queue = SampleQueue::new();
    let mut node: TelemetryNode<'_, MockBarometer, CentralLink, u16> = TelemetryNode::new(
        &clock,
        &config,
        MockBarometer::new(cli.not_ready_every),
        CentralLink::default(),
    );
    let mut central = ScriptedCentral::new(!cli.no_cts, cli.cts_failures);

    if let Err(e) = block_on(node.start()) {
        warn!("Continuing without a working sensor: {}", e);
    }

    println!("{}", CSV_HEADER);

    let period = config.sampling.period_ms as u64;
    let tick = config.sampling.tick_period_ms as u64;
    let mut connect_at = Some(cli.connect_at_ms);
    let mut disconnect_at = cli.disconnect_at_ms;
    let mut conn_id = 0u16;
    let mut seq = 0u32;
    let started = Instant::now();

    for now in 1..=cli.duration_ms {
        // 1 ms tick source
        if now % tick == 0 {
            for _ in 0..tick {
                clock.tick();
            }
        }

        // Sample timer only enqueues
        if now % period == 0 {
            submit(&queue, SampleTick { seq });
            seq = seq.wrapping_add(1);
        }

        // BLE events
        if connect_at.is_some_and(|at| at <= now) {
            connect_at = None;
            conn_id += 1;
            match node.on_connected(ConnHandle(conn_id)) {
                Ok(action) => central.request(now, action),
                Err(e) => warn!("Connection refused: {}", e),
            }
            if !cli.no_subscribe {
                node.on_subscription_changed(true);
            }
        }

        if disconnect_at.is_some_and(|at| at <= now) {
            disconnect_at = None;
            central.drop_pending();
            node.on_disconnected(0x13);
            connect_at = Some(now + RECONNECT_DELAY_MS);
        }

        while let Some(event) = central.poll(now) {
            let action = node.on_sync_event(event);
            central.request(now, action);
        }

        // Deferred work
        while queue.try_receive().is_ok() {
            block_on(node.on_sample_tick());
        }

        if cli.realtime {
            let target = Duration::from_millis(now);
            let elapsed = started.elapsed();
            if elapsed < target {
                std::thread::sleep(target - elapsed);
            }
        }
    }

    let stats = node.sampler().stats();
    let link = node.notifier().link();
    info!(
        "Done: {} samples, {} not ready, {} failed; central received {} frames ({} rejected); synced: {}",
        stats.taken,
        stats.not_ready,
        stats.failed,
        link.received,
        link.rejected,
        node.sync().is_synced()
    );
    info!(
        "Frame characteristic reads {:?}",
        String::from_utf8_lossy(&link.value).trim_end()
    );

    ExitCode::SUCCESS
}
