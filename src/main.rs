// main.rs
use std::time::Duration;

use clap::{Parser, Subcommand};
use hubspace_lights::{
    AppState, ControlService,
    attributes::Power,
    config::Settings,
    devices,
    metrics,
    models::{ControlRequest, ControlResponse},
    router,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "hubspace-lights")]
#[command(about = "Control Hubspace smart lights from the command line or over HTTP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP control API (default)
    Serve,
    /// Switch every light on together, wait, switch them all off again
    Sync {
        /// Seconds to keep the lights on
        #[arg(long, default_value_t = 3)]
        hold_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let settings = Settings::new().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let client = devices::build_client(&settings.hubspace)?;
    let service = ControlService::new(client, settings.hubspace.credentials(), &settings.dispatch);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, service).await,
        Command::Sync { hold_secs } => sync(service, Duration::from_secs(hold_secs)).await,
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

async fn serve(settings: Settings, service: ControlService) -> anyhow::Result<()> {
    if settings.metrics.enabled {
        metrics::setup_metrics(settings.metrics.port)?;
        tracing::info!("Metrics exported on port {}", settings.metrics.port);
    }

    service
        .refresh()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize Hubspace client: {}", e))?;

    let state = AppState::new(service, settings.server.token.clone());
    let app = router(state);

    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind address: {}", e))?;

    tracing::info!("Server started on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

async fn sync(service: ControlService, hold: Duration) -> anyhow::Result<()> {
    let inventory = service.refresh().await?;
    if inventory.devices.is_empty() {
        anyhow::bail!("No devices found! Make sure you have Hubspace devices set up.");
    }

    println!("Found devices:");
    for (i, device) in inventory.devices.iter().enumerate() {
        println!("{}. {} (ID: {}, type: {})", i + 1, device.name, device.id, device.device_class);
    }

    let lights = inventory.lights();
    if lights.is_empty() {
        anyhow::bail!("No light devices found to control!");
    }
    println!("\nFound {} light(s) to control", lights.len());

    println!("\nTurning ON all lights simultaneously...");
    report(&service.control(&ControlRequest::power(Power::On)).await?);

    println!("\nWaiting {} seconds to see all lights ON...", hold.as_secs());
    tokio::time::sleep(hold).await;

    println!("\nTurning OFF all lights simultaneously...");
    report(&service.control(&ControlRequest::power(Power::Off)).await?);

    println!("\nDevice states:");
    for light in service.lights().await? {
        println!("  {}: Power is {}", light.name, light.power);
    }

    Ok(())
}

fn report(response: &ControlResponse) {
    for result in &response.results {
        let mark = if result.success { "ok" } else { "FAILED" };
        println!("  [{mark}] {}", result.message);
    }
    println!("{}", response.message);
}
