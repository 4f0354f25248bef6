use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ai_client::Gemini;
use bloomify_api::{build_router, AppState};
use bloomify_chat::{ChatDeps, GeminiEmbedder, PgStore};
use bloomify_common::{file_config::load_config, AppConfig};

#[derive(Parser)]
#[command(name = "bloomify-api", about = "Bloomify florist chat API")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, env = "BLOOMIFY_CONFIG", default_value = "./config/bloomify.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting bloomify-api");

    let cli = Cli::parse();
    tracing::info!(config = %cli.config.display(), "Loading config");
    let file_config = load_config(&cli.config).with_context(|| {
        format!(
            "Could not load {}. Create one or specify --config <path>",
            cli.config.display()
        )
    })?;

    // Secrets from env vars
    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(file_config.timeouts.store())
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Migrations complete");

    // Transport timeout sits above the per-call deadlines enforced by the core.
    let http_client = reqwest::Client::builder()
        .timeout(file_config.timeouts.generation() + Duration::from_secs(5))
        .build()?;

    let mut gemini = Gemini::new(&config.gemini_api_key, &file_config.models.generation)
        .with_embedding_model(&file_config.models.embedding)
        .with_http_client(http_client);
    if let Some(base_url) = &config.gemini_base_url {
        gemini = gemini.with_base_url(base_url);
    }
    tracing::info!(
        generation = %file_config.models.generation,
        embedding = %file_config.models.embedding,
        "AI models configured"
    );

    let host = file_config.server.host.clone();
    let port = file_config.server.port;
    let allowed_origins = file_config.server.allowed_origins.clone();

    let store = Arc::new(PgStore::new(pool));
    let deps = ChatDeps::new(
        store.clone(),
        store.clone(),
        Arc::new(GeminiEmbedder::new(gemini.clone())),
        Arc::new(gemini),
        store.clone(),
        store,
        Arc::new(file_config),
    );

    let app = build_router(AppState::new(deps), &allowed_origins);

    let addr = format!("{host}:{port}");
    tracing::info!("Bloomify API listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
