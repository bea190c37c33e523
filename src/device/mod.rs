//! Device runtime
//!
//! One simulated emitter: an independent tick loop that samples its
//! configured distribution, probabilistically drops packets, publishes
//! telemetry batches on its own topic, and reacts to session commands.
//!
//! # State machine
//!
//! ```text
//! Active --(stop command / session stop)--> Stopping --> Terminated
//! ```
//!
//! No transition back to `Active`.
//!
//! # Concurrency
//!
//! The tick loop runs on the device's own thread. Inbound commands arrive on
//! the bus delivery context and are handled there, possibly concurrently
//! with a tick. The two paths share only [`DeviceShared`]: an atomic
//! `stopped` flag (written by the handler, read by the loop) and atomic
//! stats counters (written by the loop, snapshotted by `gather`). The loop
//! observes a raised flag within one tick period.

use crate::bus::{BusConnection, BusConnector};
use crate::config::DeviceConfig;
use crate::protocol::{self, Command, Response, Sample};
use crate::sampler::Distribution;
use crate::session::SessionContext;
use crate::stats::{DeviceStats, StatsSnapshot};
use crate::Result;
use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of a device runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Ticking and answering commands
    Active,
    /// Stop observed, loop about to exit
    Stopping,
    /// Loop exited and connection torn down
    Terminated,
}

/// State shared between the tick loop and the command handler
struct DeviceShared {
    config: DeviceConfig,
    stats: DeviceStats,
    stopped: AtomicBool,
}

/// Runtime for one device
///
/// Owns the device's identity, RNG, bus connection, and lifecycle. Designed
/// to run on its own thread via [`DeviceRuntime::run`]; the per-tick body is
/// factored into [`DeviceRuntime::tick`] so accounting is directly testable.
pub struct DeviceRuntime {
    shared: Arc<DeviceShared>,
    distribution: Arc<Distribution>,
    session: SessionContext,
    connector: Arc<dyn BusConnector>,
    connection: Option<Arc<dyn BusConnection>>,
    rng: Xoshiro256PlusPlus,
    state: DeviceState,
}

impl DeviceRuntime {
    pub fn new(
        config: DeviceConfig,
        distribution: Arc<Distribution>,
        session: SessionContext,
        connector: Arc<dyn BusConnector>,
    ) -> Self {
        Self::with_rng(config, distribution, session, connector, Xoshiro256PlusPlus::from_entropy())
    }

    /// Deterministic drop/draw decisions for reproducible tests
    pub fn with_seed(
        config: DeviceConfig,
        distribution: Arc<Distribution>,
        session: SessionContext,
        connector: Arc<dyn BusConnector>,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            config,
            distribution,
            session,
            connector,
            Xoshiro256PlusPlus::seed_from_u64(seed),
        )
    }

    fn with_rng(
        config: DeviceConfig,
        distribution: Arc<Distribution>,
        session: SessionContext,
        connector: Arc<dyn BusConnector>,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        Self {
            shared: Arc::new(DeviceShared {
                config,
                stats: DeviceStats::new(),
                stopped: AtomicBool::new(false),
            }),
            distribution,
            session,
            connector,
            connection: None,
            rng,
            state: DeviceState::Active,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Whether this device has been told to stop (command or session stop)
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    /// Connect to the bus and subscribe to the session command topic
    ///
    /// Failure here is fatal for this device only; the runtime never enters
    /// its active loop.
    pub fn connect(&mut self) -> Result<()> {
        let full_name = self.shared.config.full_name();
        let connection = self
            .connector
            .connect(&full_name)
            .with_context(|| format!("{full_name} failed to connect to the bus"))?;

        let shared = Arc::clone(&self.shared);
        let handler_connection = Arc::clone(&connection);
        let response_topic = self.session.response_topic();
        connection
            .subscribe(
                &self.session.command_topic(),
                Arc::new(move |payload: &[u8]| {
                    Self::handle_command(&shared, &handler_connection, &response_topic, payload);
                }),
            )
            .with_context(|| format!("{full_name} failed to subscribe to the command topic"))?;

        tracing::info!("{} has connected!", full_name);
        self.connection = Some(connection);
        Ok(())
    }

    /// Process one inbound session command
    ///
    /// Runs on the bus delivery context. Malformed or unrecognized payloads
    /// are ignored; they are never fatal.
    fn handle_command(
        shared: &Arc<DeviceShared>,
        connection: &Arc<dyn BusConnection>,
        response_topic: &str,
        payload: &[u8],
    ) {
        let command = match Command::decode(payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("{} ignoring command: {e:#}", shared.config.full_name());
                return;
            }
        };

        match command {
            Command::StopSession => {
                shared.stopped.store(true, Ordering::Relaxed);
            }
            Command::StopDevice { id } => {
                if id != shared.config.id {
                    return;
                }
                shared.stopped.store(true, Ordering::Relaxed);
                let full_name = shared.config.full_name();
                tracing::info!("Stopping {}", full_name);
                let response = Response::StopDevice {
                    id,
                    msg: format!("Device {full_name} has stopped!"),
                };
                Self::respond(shared, connection, response_topic, &response);
            }
            Command::Gather => {
                let response = Response::Gather {
                    data: shared.config.clone(),
                    stats: shared.stats.snapshot(),
                };
                Self::respond(shared, connection, response_topic, &response);
            }
        }
    }

    fn respond(
        shared: &DeviceShared,
        connection: &Arc<dyn BusConnection>,
        response_topic: &str,
        response: &Response,
    ) {
        let publish = response
            .encode()
            .and_then(|payload| connection.publish(response_topic, &payload, 0));
        if let Err(e) = publish {
            tracing::warn!("{} failed to respond: {e:#}", shared.config.full_name());
        }
    }

    /// One sampling iteration: drop decision, batch generation, accounting
    ///
    /// The batch is built and serialized before the publish/drop branch so a
    /// dropped tick records the size the payload would have had.
    pub fn tick(&mut self) -> Result<()> {
        let dropped = self.rng.gen::<f64>() < self.shared.config.drop_rate;
        let batch = self.generate_batch();
        let payload = protocol::encode_batch(&batch)?;

        let connection = self
            .connection
            .as_ref()
            .context("Device is not connected")?;

        if dropped {
            self.shared.stats.record_dropped(payload.len() as u64);
        } else {
            connection.publish(&self.shared.config.topic, &payload, self.shared.config.qos)?;
            self.shared.stats.record_sent(payload.len() as u64);
        }
        Ok(())
    }

    /// One sample per configured channel
    fn generate_batch(&mut self) -> Vec<Sample> {
        let config = &self.shared.config;
        let timestamp = chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        (0..config.data_channels)
            .map(|_| {
                let draw = self.rng.gen::<f64>();
                let raw = self.distribution.sample(draw);
                let value = config.range.rescale_from(&self.distribution.range(), raw);
                Sample {
                    data_type: config.data_type.clone(),
                    grade: config.data_grade.clone(),
                    value,
                    timestamp,
                }
            })
            .collect()
    }

    /// Connect, then tick at the configured frequency until stopped
    ///
    /// Exits when the session-wide stop signal is raised or this device's
    /// `stopped` flag is set, then disconnects.
    pub fn run(&mut self) -> Result<()> {
        self.connect()?;

        let period = Duration::from_secs_f64(1.0 / self.shared.config.frequency);

        loop {
            if self.session.stop_requested() || self.is_stopped() {
                self.state = DeviceState::Stopping;
                break;
            }

            let tick_start = Instant::now();
            self.tick()?;

            // Sleep until 1/frequency has elapsed since the tick began
            if let Some(remaining) = period.checked_sub(tick_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        if let Some(connection) = self.connection.take() {
            connection.disconnect()?;
        }
        self.state = DeviceState::Terminated;
        tracing::info!("{} has disconnected!", self.shared.config.full_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::memory::MemoryBus;
    use crate::bus::MessageHandler;
    use crate::config::{DistributionConfig, Range};
    use crossbeam::channel;

    fn distribution() -> Arc<Distribution> {
        Arc::new(
            Distribution::from_config(&DistributionConfig::Continuous {
                range: Range::new(0.0, 1.0),
                inv_cdf: "linear".to_string(),
            })
            .unwrap(),
        )
    }

    fn config(id: u64, drop_rate: f64) -> DeviceConfig {
        DeviceConfig {
            id,
            name: format!("thermo-{id}"),
            topic: format!("plant/thermo-{id}"),
            frequency: 100.0,
            drop_rate,
            data_channels: 3,
            data_type: "temperature".to_string(),
            data_grade: "celsius".to_string(),
            range: Range::new(15.0, 35.0),
            distribution: "linear".to_string(),
            qos: 0,
        }
    }

    fn runtime(
        bus: &MemoryBus,
        session: &SessionContext,
        id: u64,
        drop_rate: f64,
    ) -> DeviceRuntime {
        DeviceRuntime::with_seed(
            config(id, drop_rate),
            distribution(),
            session.clone(),
            Arc::new(bus.clone()),
            42 + id,
        )
    }

    fn collect(bus: &MemoryBus, topic: &str) -> channel::Receiver<Vec<u8>> {
        let listener = bus.connect("listener").unwrap();
        let (tx, rx) = channel::unbounded();
        let handler: MessageHandler = Arc::new(move |payload: &[u8]| {
            tx.send(payload.to_vec()).unwrap();
        });
        listener.subscribe(topic, handler).unwrap();
        rx
    }

    #[test]
    fn test_tick_accounting_without_drops() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let rx = collect(&bus, "plant/thermo-1");

        let mut device = runtime(&bus, &session, 1, 0.0);
        device.connect().unwrap();
        for _ in 0..5 {
            device.tick().unwrap();
        }

        let stats = device.stats();
        assert_eq!(stats.sent_packets, 5);
        assert_eq!(stats.dropped_packets, 0);
        assert!(stats.sent_size > 0);
        assert_eq!(stats.dropped_size, 0);
        assert_eq!(rx.len(), 5);
    }

    #[test]
    fn test_tick_accounting_with_certain_drops() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let rx = collect(&bus, "plant/thermo-1");

        let mut device = runtime(&bus, &session, 1, 1.0);
        device.connect().unwrap();
        for _ in 0..5 {
            device.tick().unwrap();
        }

        let stats = device.stats();
        assert_eq!(stats.sent_packets, 0);
        assert_eq!(stats.dropped_packets, 5);
        // Size of the would-be batch, not stale data
        assert!(stats.dropped_size > 0);
        assert_eq!(rx.len(), 0);
    }

    #[test]
    fn test_telemetry_batch_shape_and_rescale() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let rx = collect(&bus, "plant/thermo-1");

        let mut device = runtime(&bus, &session, 1, 0.0);
        device.connect().unwrap();
        device.tick().unwrap();

        let batch = protocol::decode_batch(&rx.recv().unwrap()).unwrap();
        assert_eq!(batch.len(), 3);
        for sample in &batch {
            assert_eq!(sample.data_type, "temperature");
            assert_eq!(sample.grade, "celsius");
            assert!(sample.value >= 15.0 && sample.value <= 35.0);
            assert!(sample.timestamp > 0.0);
        }
    }

    #[test]
    fn test_stop_device_targets_only_matching_id() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let responses = collect(&bus, &session.response_topic());

        let mut first = runtime(&bus, &session, 1, 0.0);
        let mut second = runtime(&bus, &session, 2, 0.0);
        first.connect().unwrap();
        second.connect().unwrap();

        let controller = bus.connect("controller").unwrap();
        let payload = Command::StopDevice { id: 1 }.encode().unwrap();
        controller.publish(&session.command_topic(), &payload, 0).unwrap();

        assert!(first.is_stopped());
        assert!(!second.is_stopped());

        // The surviving device keeps ticking
        second.tick().unwrap();
        assert_eq!(second.stats().sent_packets, 1);

        let response = Response::decode(&responses.recv().unwrap()).unwrap();
        match response {
            Response::StopDevice { id, msg } => {
                assert_eq!(id, 1);
                assert!(msg.contains("thermo-1 (id 1)"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert!(responses.try_recv().is_err(), "only one device responds");
    }

    #[test]
    fn test_stop_session_stops_every_device() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");

        let mut first = runtime(&bus, &session, 1, 0.0);
        let mut second = runtime(&bus, &session, 2, 0.0);
        first.connect().unwrap();
        second.connect().unwrap();

        let controller = bus.connect("controller").unwrap();
        let payload = Command::StopSession.encode().unwrap();
        controller.publish(&session.command_topic(), &payload, 0).unwrap();

        assert!(first.is_stopped());
        assert!(second.is_stopped());
    }

    #[test]
    fn test_gather_snapshot_is_not_fresher_than_command() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let responses = collect(&bus, &session.response_topic());

        let mut device = runtime(&bus, &session, 1, 0.0);
        device.connect().unwrap();
        device.tick().unwrap();
        device.tick().unwrap();

        let controller = bus.connect("controller").unwrap();
        let payload = Command::Gather.encode().unwrap();
        controller.publish(&session.command_topic(), &payload, 0).unwrap();

        // Ticks after the command must not leak into the response
        device.tick().unwrap();

        let response = Response::decode(&responses.recv().unwrap()).unwrap();
        match response {
            Response::Gather { data, stats } => {
                assert_eq!(data, config(1, 0.0));
                assert_eq!(stats.sent_packets, 2);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_commands_are_ignored() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let responses = collect(&bus, &session.response_topic());

        let mut device = runtime(&bus, &session, 1, 0.0);
        device.connect().unwrap();

        let controller = bus.connect("controller").unwrap();
        let command_topic = session.command_topic();
        controller.publish(&command_topic, b"not json", 0).unwrap();
        controller
            .publish(&command_topic, br#"{"cmd":"reboot"}"#, 0)
            .unwrap();

        assert!(!device.is_stopped());
        assert!(responses.try_recv().is_err());
        device.tick().unwrap();
        assert_eq!(device.stats().sent_packets, 1);
    }

    #[test]
    fn test_run_exits_on_session_stop() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let mut device = runtime(&bus, &session, 1, 0.0);

        let handle = std::thread::spawn(move || {
            device.run().unwrap();
            device
        });

        std::thread::sleep(Duration::from_millis(50));
        session.request_stop();
        let device = handle.join().unwrap();

        assert_eq!(device.state(), DeviceState::Terminated);
        assert!(device.stats().total_packets() > 0);
    }

    #[test]
    fn test_run_exits_on_stop_device_command() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let mut device = runtime(&bus, &session, 7, 0.0);

        let controller = bus.connect("controller").unwrap();
        let command_topic = session.command_topic();

        let handle = std::thread::spawn(move || {
            device.run().unwrap();
            device
        });

        std::thread::sleep(Duration::from_millis(50));
        let payload = Command::StopDevice { id: 7 }.encode().unwrap();
        controller.publish(&command_topic, &payload, 0).unwrap();
        let device = handle.join().unwrap();

        assert_eq!(device.state(), DeviceState::Terminated);
        assert!(device.is_stopped());
    }

    #[test]
    fn test_tick_before_connect_fails() {
        let bus = MemoryBus::new();
        let session = SessionContext::new("run");
        let mut device = runtime(&bus, &session, 1, 0.0);
        assert!(device.tick().is_err());
    }
}
