use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidtweet_server::{
    create_router,
    db::{self, PgUserRepository, PgVideoRepository},
    media::CloudinaryStore,
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidtweet_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.connection_uri()).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database connected");

    tokio::fs::create_dir_all(&config.upload_temp_dir).await?;

    let state = AppState {
        users: Arc::new(PgUserRepository::new(pool.clone())),
        videos: Arc::new(PgVideoRepository::new(pool)),
        media: Arc::new(CloudinaryStore::new(&config.cloudinary)),
        config: config.clone(),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
