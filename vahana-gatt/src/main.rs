use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info};

use vahana_gatt::bluez::{self, BluerLinks};
use vahana_gatt::{
    AdvertisementSpec, Application, CpuTempProbe, Ed25519Signer, PairingState, gateway_service,
    identity, logging,
};

#[derive(clap::Parser)]
#[command(name = "vahana-gatt")]
#[command(about = "Vahana BLE gateway peripheral")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a new signing identity
    CreateKey,
    /// Run the peripheral
    Run,
    /// List devices known to the Bluetooth adapter
    ListDevices,
}

#[tokio::main]
async fn main() {
    let cli: Cli = clap::Parser::parse();
    let home = identity::vahana_home();

    match cli.command {
        Commands::CreateKey => identity::create_key(&home),
        Commands::ListDevices => {
            let (_session, adapter) = match bluez::connect_adapter().await {
                Ok(connected) => connected,
                Err(e) => {
                    eprintln!("No usable Bluetooth adapter: {e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = bluez::list_devices(&adapter).await {
                eprintln!("Failed to list devices: {e}");
                std::process::exit(1);
            }
        }
        Commands::Run => {
            let _logging = logging::init(&home);
            if let Err(e) = run(&home).await {
                // Registration failures are terminal: no retry, no fallback
                // advertising mode.
                error!("startup failed: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(home: &Path) -> anyhow::Result<()> {
    let pairing = PairingState::from_env();
    match &pairing {
        PairingState::Paired { owner_id, .. } => info!("paired, owner {owner_id}"),
        PairingState::Unpaired => info!("not paired"),
    }

    let key = identity::load_or_create(home).context("signing identity unavailable")?;
    let signer = Arc::new(Ed25519Signer::new(key));

    let (session, adapter) = bluez::connect_adapter()
        .await
        .context("Bluetooth adapter not found")?;
    info!("adapter {} powered and discoverable", adapter.name());

    let _agent = session_agent(&session).await?;

    let links = Arc::new(BluerLinks::new(adapter.clone()));
    let probe = Arc::new(CpuTempProbe);

    let mut application = Application::new();
    application.add_service(gateway_service(&pairing, signer, links, probe));
    for path in application.attribute_paths() {
        debug!("attribute {path}");
    }

    let spec = AdvertisementSpec::gateway();
    let _advertisement = bluez::advertise(&adapter, &spec)
        .await
        .context("failed to register advertisement")?;
    info!("advertisement registered as {:?}", spec.local_name);

    let _application = bluez::serve_application(&adapter, &application)
        .await
        .context("failed to register GATT application")?;
    info!("GATT application registered");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

async fn session_agent(session: &bluer::Session) -> anyhow::Result<bluer::agent::AgentHandle> {
    let agent = bluez::register_agent(session)
        .await
        .context("failed to register pairing agent")?;
    info!("pairing agent registered");
    Ok(agent)
}
