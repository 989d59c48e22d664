//! Lightsaber blade controller
//!
//! Watches the hilt button and drives the blade LEDs through an Open Pixel
//! Control server. Optionally serves a small HTTP API for status and remote
//! presses.
//!
//! ## Architecture
//! - **GPIO watcher thread**: blocks on button interrupts, pushes raw edges
//! - **Classifier thread**: turns edges into short presses and holds
//! - **Blade thread**: owns the blade state and the OPC connection
//! - **HTTP server** (tokio/axum, optional): reads status, injects presses
//!
//! ## Usage
//! ```sh
//! ./target/release/lightsaber-rs --config blade.json --http-port 8080
//! ```

use clap::Parser;
use lightsaber_rs::blade::Blade;
use lightsaber_rs::config::BladeConfig;
use lightsaber_rs::controller::{self, BladeCommand, BladeStatus, blade_loop, classifier_loop};
use lightsaber_rs::gpio::{EdgeEvents, SysfsPin, watch_edges};
use lightsaber_rs::input::{ClassifierSettings, InputClassifier};
use lightsaber_rs::server::{self, AppState};
use lightsaber_rs::sink::{OpcClient, PixelSink};
use lightsaber_rs::time::SystemClock;
use lightsaber_rs::{is_running, setup_signal_handler};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Lightsaber blade controller
#[derive(Parser)]
#[command(name = "lightsaber-rs")]
#[command(about = "Push-button lightsaber blade controller for Open Pixel Control LED servers")]
#[command(version)]
struct Args {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// OPC server address (host:port)
    #[arg(long)]
    sink: Option<String>,

    /// Total number of LEDs across both strips
    #[arg(long)]
    led_count: Option<usize>,

    /// Linux GPIO number of the button
    #[arg(long)]
    button_gpio: Option<u32>,

    /// sysfs GPIO directory
    #[arg(long)]
    gpio_root: Option<PathBuf>,

    /// Serve the HTTP API on this port
    #[arg(long)]
    http_port: Option<u16>,
}

impl Args {
    /// Load the config file (if any) and apply command-line overrides.
    fn blade_config(&self) -> Result<BladeConfig, lightsaber_rs::BladeError> {
        let mut config = match &self.config {
            Some(path) => BladeConfig::load(path)?,
            None => BladeConfig::default(),
        };
        if let Some(sink) = &self.sink {
            config.sink_address = sink.clone();
        }
        if let Some(led_count) = self.led_count {
            config.led_count = led_count;
        }
        if let Some(gpio) = self.button_gpio {
            config.button_gpio = gpio;
        }
        if let Some(root) = &self.gpio_root {
            config.gpio_root = root.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let config = args.blade_config()?;

    tracing::info!("Lightsaber controller v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Blade: {} LEDs ({} per strip), {} colors",
        config.led_count,
        config.segment_length(),
        config.colors.len()
    );
    tracing::info!("OPC server: {}", config.sink_address);
    tracing::info!("Button: GPIO {}", config.button_gpio);

    let running = setup_signal_handler()?;

    // A missing OPC server is not fatal: the button has to keep working.
    let mut sink = OpcClient::new(config.sink_address.clone(), config.opc_channel);
    let connected = sink.can_connect();
    if connected {
        tracing::info!("Connected to OPC server.");
    } else {
        tracing::warn!("Could not connect to OPC server at {}.", config.sink_address);
    }

    let blade = Blade::new(&config, sink, SystemClock)?;
    let colors = Arc::new(blade.colors().to_vec());
    let status = Arc::new(Mutex::new(BladeStatus::new(&blade, connected)));

    // Blade thread.
    let (command_tx, command_rx) = mpsc::channel();
    let blade_status = status.clone();
    let blade_handle = thread::spawn(move || {
        blade_loop(command_rx, blade, blade_status);
    });

    // Button threads. Without the button the API is the only way in, so a
    // missing pin is only tolerated when the API is enabled.
    let button = SysfsPin::open(&config.gpio_root, config.button_gpio)
        .and_then(|pin| pin.edge_events().map(|events| (pin, events)));
    match button {
        Ok((pin, events)) => {
            spawn_button(pin, events, &config, command_tx.clone(), running.clone());
        }
        Err(e) if args.http_port.is_some() => {
            tracing::error!("Button unavailable, continuing with HTTP API only: {}", e);
        }
        Err(e) => {
            // Let the blade thread exit cleanly before bailing out.
            let _ = command_tx.send(BladeCommand::Shutdown);
            let _ = blade_handle.join();
            return Err(e.into());
        }
    }

    tracing::info!("Ready! Use the button to control the lightsaber.");

    match args.http_port {
        Some(port) => {
            let app = server::create_router(AppState {
                command_tx: command_tx.clone(),
                status: status.clone(),
                colors,
            });

            let addr = format!("0.0.0.0:{port}");
            tracing::info!("Listening on http://{}", addr);
            tracing::info!("API Documentation: http://localhost:{}/docs", port);

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(wait_for_stop(running.clone()))
                .await?;
        }
        None => wait_for_stop(running.clone()).await,
    }

    tracing::info!("Exiting program...");
    // Any sweep in progress finishes first, then the blade is cleared.
    let _ = command_tx.send(BladeCommand::Shutdown);
    if blade_handle.join().is_err() {
        tracing::error!("Blade thread panicked");
    }
    tracing::info!("Final state: {:?}", controller::lock(&status).phase);

    Ok(())
}

fn spawn_button(
    pin: SysfsPin,
    events: EdgeEvents,
    config: &BladeConfig,
    commands: mpsc::Sender<BladeCommand>,
    running: Arc<AtomicBool>,
) {
    let (edge_tx, edge_rx) = mpsc::channel();

    thread::spawn(move || {
        watch_edges(events, SystemClock, edge_tx, running);
    });

    let settings = ClassifierSettings::from_config(config);
    let classifier = InputClassifier::new(pin, SystemClock, settings);
    thread::spawn(move || {
        classifier_loop(edge_rx, classifier, commands);
    });
}

/// Resolve once Ctrl+C has cleared the running flag.
async fn wait_for_stop(running: Arc<AtomicBool>) {
    while is_running(&running) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
