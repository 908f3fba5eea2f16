mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use deadpool_postgres::{Config as PoolConfig, Runtime};
use scrapper_core::config::Config;
use scrapper_core::storage::{LinkServiceKind, LinkStorage, MemoryLinkStorage, OrmLinkStorage, SqlLinkStorage};
use scrapper_core::{migrations, BotClient, Monitor};
use tokio_postgres::NoTls;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

pub struct AppState {
    pub storage: Arc<dyn LinkStorage>,
    pub bot_client: Arc<BotClient>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scrapper_server=info,scrapper_core=info,tower_http=warn".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let mut pool_config = PoolConfig::new();
    pool_config.url = Some(config.database_url.clone());
    let pool = pool_config.create_pool(Some(Runtime::Tokio1), NoTls)?;

    {
        let mut client = pool.get().await?;
        migrations::run_migrations(&mut client).await?;
    }

    let storage: Arc<dyn LinkStorage> = match config.link_service {
        LinkServiceKind::Sql => Arc::new(SqlLinkStorage::new(pool.clone())),
        LinkServiceKind::Orm => Arc::new(OrmLinkStorage::new(pool.clone())),
        LinkServiceKind::Memory => Arc::new(MemoryLinkStorage::new()),
    };

    let http_client = reqwest::Client::new();
    let bot_client = Arc::new(BotClient::new(http_client.clone(), &config.bot_host));

    let monitor = Arc::new(Monitor::new(
        Arc::clone(&storage),
        Arc::clone(&bot_client),
        http_client,
        config.github_api_key.clone(),
        config.stackoverflow_api_key.clone(),
        config.number_of_workers,
    ));
    monitor.spawn();

    let state = Arc::new(AppState {
        storage,
        bot_client,
        config: Arc::clone(&config),
    });

    let app = Router::new()
        .route("/tg-chat/:id", post(routes::create_chat))
        .route("/tg-chat/:id", delete(routes::delete_chat))
        .route("/links", get(routes::get_links))
        .route("/links", post(routes::add_link))
        .route("/links", delete(routes::remove_link))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.scrapper_host.clone();
    info!("scrapper listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
