use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::domain::error::Result;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::{add_log, start_server};

pub async fn run() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = AppConfig::load()?;
    let state = crate::infrastructure::bootstrap::setup(&config)?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    add_log(
        &state.logs,
        "INFO",
        "Server",
        &format!("Listening on http://{}/api", address),
    );
    info!(address = %address, data_dir = %config.data_dir.display(), "Starting HTTP server");

    start_server(state, &config.server.host, config.server.port)?.await?;
    Ok(())
}
