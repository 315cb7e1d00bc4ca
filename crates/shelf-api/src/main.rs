use shelf_api::setup;
use shelf_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, gateway, services, routes)
    let (_state, router, reconciler) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router, reconciler).await?;

    Ok(())
}
