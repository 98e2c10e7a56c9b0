use backoffice_api::{build_router, state::AppState};
use backoffice_config::Settings;
use backoffice_db::{connect, indexes::ensure_indexes};
use backoffice_services::build_cache;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "backoffice_api=debug,backoffice_services=debug,backoffice_db=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting back office API on {}:{}", settings.app.host, settings.app.port);
    info!(
        backend = ?settings.cache.backend,
        ttl_secs = settings.cache.ttl_secs,
        max_entries = settings.cache.max_entries,
        "List cache config"
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    let cache = build_cache(&settings).await;
    let app_state = AppState::new(db, settings.clone(), cache);
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
