use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quietcount::{
    config::{Settings, StoreBackend},
    geo::GeoIpLookup,
    router,
    state::AppState,
    store::{AnalyticsStore, RemoteStore, SqliteStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let settings = Settings::new()?;
    let dataset = settings.validated_dataset()?.to_string();
    info!("Configuration loaded");

    let store: Arc<dyn AnalyticsStore> = match settings.store_backend {
        StoreBackend::Sqlite => {
            let url = settings.database_url();
            info!("Opening SQLite analytics store at {}", url);
            Arc::new(SqliteStore::connect(&url, &dataset).await?)
        }
        StoreBackend::Remote => {
            let credentials = settings.remote_credentials()?;
            let remote = RemoteStore::new(&settings.api_base_url, &dataset, credentials)?;
            info!("Using remote analytics store at {}", remote.sql_url());
            Arc::new(remote)
        }
    };

    // Initialize GeoIP
    let geo = GeoIpLookup::new(settings.maxmind_city_db.as_deref());
    if geo.is_available() {
        info!("GeoIP lookup available");
    } else {
        info!("GeoIP lookup not available, relying on country header");
    }

    let addr = SocketAddr::new(
        settings.host.parse().unwrap_or([0, 0, 0, 0].into()),
        settings.port,
    );

    let state = AppState::new(store, settings, geo)?;
    let app = router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
