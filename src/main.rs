use axum::serve;
use ml_platform_api::api::routes::create_router;
use ml_platform_api::api::state::{AppState, TokenConfig};
use ml_platform_api::config::AppConfig;
use ml_platform_api::gateway::{AirflowOrchestrator, S3ArtifactStore};
use ml_platform_api::store::PostgresStore;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    println!("ML Platform API Server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    println!("Connecting to PostgreSQL...");
    let postgres_store = PostgresStore::new(&config.database_url()).await?;

    println!("Running database migrations...");
    postgres_store.migrate().await?;
    println!("Database ready");

    let orchestrator = AirflowOrchestrator::new(
        &config.orchestrator_endpoint(),
        &config.orchestrator_username(),
        &config.orchestrator_password(),
    )?;

    let artifacts = S3ArtifactStore::new(
        &config.artifact_endpoint(),
        &config.artifact_access_key(),
        &config.artifact_secret_key(),
        config.artifact_secure(),
    )?;

    let state = AppState {
        store: Arc::new(postgres_store),
        orchestrator: Arc::new(orchestrator),
        artifacts: Arc::new(artifacts),
        tokens: TokenConfig {
            secret: config.token_secret(),
            expire_minutes: config.token_expire_minutes(),
        },
    };

    run_server(create_router(state), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("ML Platform API running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
