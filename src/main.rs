use tracing_subscriber::EnvFilter;

use careflow::{api, config, db};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Careflow starting v{}", config::APP_VERSION);

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(config::database_dir())?;
    let conn = db::open_database(&config::database_path())?;

    // Dashboards are browser apps served from elsewhere on the facility LAN.
    let app = api::facility_api_router(conn).layer(tower_http::cors::CorsLayer::permissive());
    let addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "facility API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
