use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use domotica_daemon::action::{ActionInvoker, ProcessInvoker};
use domotica_daemon::config::{load_config, DEFAULT_CONFIG_PATH};
use domotica_daemon::pid_manager::PidManager;
use domotica_daemon::pin_index::PinIndex;
use domotica_daemon::{Daemon, Lifecycle, StartupError};
use domotica_gpio::GpioBackend;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pin-control server for relays, LEDs and fans
#[derive(Parser, Debug)]
#[command(name = "domotica_server", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the in-memory GPIO backend instead of real hardware
    #[arg(long)]
    mock: bool,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Print used and free GPIO lines for the configuration, then exit
    #[arg(long)]
    pin_index: bool,

    /// Listen on this port instead of the configured one
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "domotica_daemon=debug,domotica_gpio=debug"
    } else {
        "domotica_daemon=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<StartupError>()
                .map_or(1, StartupError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn open_backend(mock: bool) -> anyhow::Result<Box<dyn GpioBackend>> {
    if mock {
        info!("Using mock GPIO backend");
        return Ok(Box::new(domotica_gpio::create_mock_backend()));
    }

    #[cfg(feature = "pi-hardware")]
    {
        use anyhow::Context;

        info!("Using rppal GPIO backend");
        let gpio = domotica_gpio::create_hardware_backend()
            .context("failed to open the GPIO peripheral")?;
        Ok(Box::new(gpio))
    }

    #[cfg(not(feature = "pi-hardware"))]
    {
        anyhow::bail!("built without the pi-hardware feature, run with --mock")
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli.config).map_err(StartupError::from)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    if cli.pin_index {
        print!("{}", PinIndex::new(&config));
        return Ok(());
    }

    info!("Pin-control server starting...");
    let _lock = PidManager::new(&config.pid_file)
        .acquire()
        .map_err(StartupError::from)?;

    let backend = open_backend(cli.mock)?;
    let invoker: Arc<dyn ActionInvoker> = Arc::new(ProcessInvoker::new());
    let lifecycle = Lifecycle::new();

    let daemon = Daemon::start(&config, backend.as_ref(), invoker, lifecycle.clone()).await?;

    let signals = tokio::spawn({
        let lifecycle = lifecycle.clone();
        let actuator = daemon.state().actuator.clone();
        let test_duration = config.test_duration();
        async move {
            // Without signal handling there is no way to stop cleanly
            if let Err(e) = lifecycle.clone().watch_signals(actuator, test_duration).await {
                error!("Failed to install signal handlers: {}", e);
                lifecycle.request_shutdown();
            }
        }
    });

    daemon.run().await;

    if let Err(e) = signals.await {
        warn!("Signal task ended abnormally: {}", e);
    }
    info!("Pin-control server stopped");
    Ok(())
}
