use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use local_market_service::clients::GeocodingClient;
use local_market_service::config::{AppConfig, StoreBackend};
use local_market_service::handlers;
use local_market_service::store::{MarketStore, MemoryStore, PgStore};

fn io_error<E: std::fmt::Display>(err: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

async fn open_store(config: &AppConfig) -> std::io::Result<Arc<dyn MarketStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "DATABASE_URL must be set in environment",
                )
            })?;
            let store = PgStore::connect(database_url, config.db_max_connections)
                .await
                .map_err(|err| {
                    log::error!("Failed to initialize database: {err:?}");
                    io_error(err)
                })?;
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|err| {
        log::error!("Invalid configuration: {err}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let store = open_store(&config).await?;
    let geocoder = GeocodingClient::new(config.geocoder_url.clone(), config.geocoder_key.clone());
    if !geocoder.is_configured() {
        log::warn!("GEOCODER_KEY not set; address search is disabled");
    }

    let bind_address = config.bind_address();
    let store_data: web::Data<dyn MarketStore> = web::Data::from(store);
    let config_data = web::Data::new(config);
    let geocoder_data = web::Data::new(geocoder);

    log::info!(
        "Starting local market service on {} ({} store)",
        bind_address,
        store_data.backend_tag()
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(store_data.clone())
            .app_data(config_data.clone())
            .app_data(geocoder_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
