use std::time::Duration;

use backoffice_config::Settings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::{info, warn};

const APP_NAME: &str = "backoffice";

/// Driver options for the configured deployment: pool bounds, app name and
/// how long to wait for a usable server.
pub async fn client_options(settings: &Settings) -> Result<ClientOptions, mongodb::error::Error> {
    let db = &settings.database;
    let mut options = ClientOptions::parse(&db.url).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.max_pool_size = db.max_pool_size.or(options.max_pool_size);
    options.min_pool_size = db.min_pool_size.or(options.min_pool_size);
    if let Some(secs) = db.server_selection_timeout_secs {
        options.server_selection_timeout = Some(Duration::from_secs(secs));
    }
    Ok(options)
}

/// Opens the configured database and pings it before handing it out.
pub async fn connect(settings: &Settings) -> Result<Database, mongodb::error::Error> {
    let client = Client::with_options(client_options(settings).await?)?;
    let db = client.database(&settings.database.name);

    if let Err(e) = db.run_command(bson::doc! { "ping": 1 }).await {
        warn!(db = %settings.database.name, error = %e, "MongoDB ping failed");
        return Err(e);
    }
    info!(db = %settings.database.name, "Connected to MongoDB");
    Ok(db)
}
