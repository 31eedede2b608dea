use std::time::Duration;

use clap::Parser;
use popgate::{
    app_state::{AppState, SharedAppState},
    http::setup_http_server,
    init_telemetry,
    settings::config::Settings,
};
use tokio::time::sleep;
use tracing::{debug, info};

const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "popgate")]
#[command(about = "Discount codes for storefront popups")]
#[clap(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser)]
enum Commands {
    /// Show current configuration and exit
    Config,
    /// Start the popgate server (default)
    Run,
}

/// Drop idle shopper keys from the issuance limiter until shutdown.
fn spawn_limiter_sweeper(app_state: SharedAppState) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    app_state.limiter.retain_recent();
                    debug!(keys = app_state.limiter.tracked_keys(), "Issuance limiter swept");
                }
                _ = app_state.stop_flag.wait() => break,
            }
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new()?;

    if let Some(Commands::Config) = cli.command {
        println!("{:#?}", &settings);
        return Ok(());
    }

    init_telemetry::init_telemetry_and_tracing(&settings)?;

    let app_state = AppState::new(settings).await?;
    let mut handles = vec![];

    handles.push(setup_http_server(app_state.clone(), &app_state.settings.api.bind_address).await?);
    if app_state.limiter.is_enabled() {
        handles.push(spawn_limiter_sweeper(app_state.clone()));
    }

    sleep(Duration::from_millis(100)).await;

    loop {
        for handle in handles.iter_mut().filter(|h| h.is_finished()) {
            // A task that ends on its own takes the server down with it.
            handle.await??;
            app_state.stop_flag.stop();
        }
        handles.retain(|handle| !handle.is_finished());

        if handles.is_empty() {
            info!("All tasks are done");
            break;
        }

        sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}
