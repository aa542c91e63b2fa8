pub mod models;

use anyhow::Context;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Handle on the order store. Constructed once by the embedding
/// application and passed into every service that needs it.
#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Open the database at `database_url` (creating it if missing) and
    /// bring the schema up to date.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = database_url
            .parse::<SqliteConnectOptions>()
            .context("invalid database url")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("connecting to database")?;

        MIGRATOR.run(&pool).await.context("running migrations")?;

        Ok(Self { pool })
    }

    /// Fresh in-memory database with the schema applied. The pool is
    /// capped at one connection because an in-memory SQLite database is
    /// per-connection.
    pub async fn new_in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory database")?;

        MIGRATOR.run(&pool).await.context("running migrations")?;

        Ok(Self { pool })
    }

    /// Wrap an already constructed pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
