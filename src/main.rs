pub mod config;
pub mod discovery;
pub mod mqtt;
pub mod session;
pub mod shutter;
pub mod ui;

use crate::config::AppConfig;
use crate::discovery::Discovery;
use crate::mqtt::connection::MqttBus;
use crate::session::Session;
use crate::shutter::ShutterController;
use crate::ui::ShutterSetupUI;
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = match AppConfig::load().await {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default settings: {}", e);
            AppConfig::default()
        }
    };
    info!(
        "Broker {}, discovery prefix '{}'",
        config.broker.url, config.discovery.prefix
    );

    // Discovery errors are only logged
    let (discovery_errors_tx, discovery_errors_rx) = mpsc::unbounded_channel();
    let _discovery_drain = discovery::spawn_error_drain(discovery_errors_rx);

    let bus = MqttBus::new();
    let controller = ShutterController::new(
        bus.clone(),
        Discovery::new(config.discovery.prefix.clone()),
        discovery_errors_tx,
    );

    // Connection errors go to the status line and the error dialog
    let (connection_errors_tx, connection_errors_rx) = mpsc::unbounded_channel();
    let (dialog_tx, dialog_rx) = mpsc::unbounded_channel();
    let _connection_monitor =
        session::spawn_connection_monitor(connection_errors_rx, controller.clone(), dialog_tx);

    let runtime = Handle::current();
    let session = Arc::new(Session::new(
        runtime.clone(),
        bus,
        controller,
        connection_errors_tx,
    ));

    info!("Starting UI");
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_title("Shutter Limit Switch Setup")
        .with_inner_size([400.0, 700.0]);

    eframe::run_native(
        "Shutter Limit Switch Setup",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(ShutterSetupUI::new(
                cc, runtime, session, config, dialog_rx,
            )))
        }),
    )
    .map_err(|e| eyre!("UI terminated with error: {}", e))?;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
