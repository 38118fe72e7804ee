//! Startup, signal handling, standby and orderly shutdown.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domotica_gpio::GpioBackend;
use domotica_types::ServerConfig;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::action::ActionInvoker;
use crate::actuator::Actuator;
use crate::error::StartupError;
use crate::monitor::spawn_monitors;
use crate::protocol::ProtocolVersion;
use crate::registry::Registry;
use crate::server::{self, AppState};

/// Process-wide shutdown and standby flags, cheap to clone.
#[derive(Clone, Default)]
pub struct Lifecycle {
    shutdown: CancellationToken,
    standby: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutdown requested");
        }
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn in_standby(&self) -> bool {
        self.standby.load(Ordering::SeqCst)
    }

    /// Enter or leave standby and return the new mode. Entering switches
    /// every output off; leaving keeps them off.
    pub fn toggle_standby(&self, actuator: &Actuator) -> bool {
        let standby = !self.standby.fetch_xor(true, Ordering::SeqCst);
        if standby {
            actuator.set_all(false);
            info!("Standby on, outputs switched off");
        } else {
            info!("Standby off");
        }
        standby
    }

    /// All outputs on for `duration`, then off. Cut short by shutdown.
    pub async fn lamp_test(&self, actuator: &Actuator, duration: Duration) {
        if self.in_standby() {
            info!("Lamp test skipped during standby");
            return;
        }
        info!(?duration, "Lamp test");
        actuator.set_all(true);
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
        actuator.set_all(false);
    }

    /// Run the lamp test on its own task so signals keep being handled.
    pub fn spawn_lamp_test(&self, actuator: Arc<Actuator>, duration: Duration) -> JoinHandle<()> {
        let lifecycle = self.clone();
        tokio::spawn(async move { lifecycle.lamp_test(&actuator, duration).await })
    }

    /// React to Unix signals until shutdown.
    ///
    /// SIGTERM and SIGINT stop the daemon, SIGUSR1 runs the lamp test and
    /// SIGUSR2 toggles standby.
    pub async fn watch_signals(
        self,
        actuator: Arc<Actuator>,
        test_duration: Duration,
    ) -> io::Result<()> {
        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut usr1 = signal(SignalKind::user_defined1())?;
        let mut usr2 = signal(SignalKind::user_defined2())?;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = terminate.recv() => {
                    info!("SIGTERM received");
                    self.request_shutdown();
                }
                _ = interrupt.recv() => {
                    info!("SIGINT received");
                    self.request_shutdown();
                }
                _ = usr1.recv() => {
                    self.spawn_lamp_test(actuator.clone(), test_duration);
                }
                _ = usr2.recv() => {
                    self.toggle_standby(&actuator);
                }
            }
        }
        Ok(())
    }
}

/// A started server: socket bound, outputs claimed, monitors running.
pub struct Daemon {
    listener: TcpListener,
    state: Arc<AppState>,
    monitors: Vec<JoinHandle<()>>,
    lifecycle: Lifecycle,
}

impl Daemon {
    /// Bring the server up.
    ///
    /// The listener is bound before any line is claimed or worker spawned,
    /// so an occupied port fails startup with nothing running.
    pub async fn start(
        config: &ServerConfig,
        backend: &dyn GpioBackend,
        invoker: Arc<dyn ActionInvoker>,
        lifecycle: Lifecycle,
    ) -> Result<Self, StartupError> {
        let registry = Arc::new(Registry::from_config(config)?);
        let version: ProtocolVersion = config.protocol_version.parse()?;
        let listener = server::bind(&config.bind_address, config.port).await?;

        let actuator = Arc::new(Actuator::new(
            registry.clone(),
            backend,
            config.pwm_frequency_hz,
            config.pulse(),
        )?);
        let monitors = spawn_monitors(
            registry.groups(),
            backend,
            &actuator,
            &invoker,
            &lifecycle,
            config.pause(),
        )?;
        info!(
            version = %version,
            monitors = monitors.len(),
            "Server started"
        );

        Ok(Self {
            listener,
            state: Arc::new(AppState::new(registry, actuator, version)),
            monitors,
            lifecycle,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Serve until shutdown, then wait for every monitor to finish.
    pub async fn run(self) {
        let Daemon {
            listener,
            state,
            monitors,
            lifecycle,
        } = self;

        server::serve(listener, state, lifecycle.token()).await;

        for monitor in monitors {
            if let Err(e) = monitor.await {
                warn!("Edge monitor ended abnormally: {}", e);
            }
        }
        info!("Server stopped");
    }
}
