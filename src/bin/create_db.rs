//! Creates the database named in `DATABASE_URL` when it does not exist yet.

use local_market_service::store::create_database_if_missing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL must be set in environment")?;

    log::info!("Ensuring database exists");
    create_database_if_missing(&database_url).await?;

    Ok(())
}
