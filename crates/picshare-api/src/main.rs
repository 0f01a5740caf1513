use picshare_api::setup;
use picshare_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, database, services, routes)
    let (state, router) = setup::initialize_app(config.clone()).await?;

    // Serve until a shutdown signal, then drain background work
    setup::server::start_server(&config, router, state).await?;

    Ok(())
}
