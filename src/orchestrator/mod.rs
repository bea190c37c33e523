//! Fleet orchestration
//!
//! Pure lifecycle management: instantiate one [`DeviceRuntime`] per
//! configured device, start each on its own thread, install the interrupt
//! handler that raises the session-wide stop signal, and block until every
//! device thread has exited. The orchestrator never inspects device-to-device
//! interaction.
//!
//! A device whose runtime fails (e.g. bus connect error) is fatal for that
//! device only; its thread logs the error and exits while the rest of the
//! fleet keeps running.

use crate::bus::BusConnector;
use crate::config::DeviceConfig;
use crate::device::DeviceRuntime;
use crate::sampler::DistributionRegistry;
use crate::session::SessionContext;
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Start-all, wait-for-signal, join-all fleet lifecycle
pub struct Orchestrator {
    runtimes: Vec<DeviceRuntime>,
    session: SessionContext,
    handles: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("runtimes", &self.runtimes.len())
            .field("handles", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build runtimes for the whole fleet
    ///
    /// Resolves every device's distribution up front; an unknown reference
    /// is a configuration error before any device starts.
    pub fn new(
        devices: Vec<DeviceConfig>,
        registry: &DistributionRegistry,
        session: SessionContext,
        connector: Arc<dyn BusConnector>,
    ) -> Result<Self> {
        let mut runtimes = Vec::with_capacity(devices.len());
        for config in devices {
            let distribution = registry.get(&config.distribution).with_context(|| {
                format!(
                    "{} references unknown distribution \"{}\"",
                    config.full_name(),
                    config.distribution
                )
            })?;
            runtimes.push(DeviceRuntime::new(
                config,
                distribution,
                session.clone(),
                Arc::clone(&connector),
            ));
        }

        Ok(Self {
            runtimes,
            session,
            handles: Vec::new(),
        })
    }

    pub fn fleet_size(&self) -> usize {
        self.runtimes.len() + self.handles.len()
    }

    /// Start one named thread per device
    pub fn spawn(&mut self) -> Result<()> {
        for mut runtime in self.runtimes.drain(..) {
            let full_name = runtime.config().full_name();
            let handle = std::thread::Builder::new()
                .name(format!("device-{}", runtime.config().id))
                .spawn(move || {
                    if let Err(e) = runtime.run() {
                        tracing::error!("{} terminated with error: {e:#}", full_name);
                    }
                })
                .context("Failed to spawn device thread")?;
            self.handles.push(handle);
        }
        Ok(())
    }

    /// Raise the session stop signal on Ctrl-C
    ///
    /// Runs on a detached thread with a minimal current-thread runtime; the
    /// thread never finishes if no signal arrives, which is fine because the
    /// process exits once the fleet is joined.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let session = self.session.clone();
        std::thread::Builder::new()
            .name("interrupt".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Cannot install interrupt handler: {e}");
                        return;
                    }
                };
                runtime.block_on(async {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Stopping the simulator...");
                        session.request_stop();
                    }
                });
            })
            .context("Failed to spawn interrupt thread")?;
        Ok(())
    }

    /// Block until every device thread has exited
    pub fn join(self) -> Result<()> {
        for handle in self.handles {
            if handle.join().is_err() {
                anyhow::bail!("A device thread panicked");
            }
        }
        Ok(())
    }

    /// Spawn the fleet, install the interrupt handler, and join
    pub fn run(mut self) -> Result<()> {
        self.spawn()?;
        self.install_interrupt_handler()?;
        self.join()
    }
}
