use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod memory;
mod users;
mod videos;

pub use memory::{MemoryUserRepository, MemoryVideoRepository};
pub use users::{NewUser, PgUserRepository, UserRecord, UserRepository, DUPLICATE_USER};
pub use videos::{PgVideoRepository, VideoRepository};

pub type DbPool = PgPool;

pub async fn create_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
