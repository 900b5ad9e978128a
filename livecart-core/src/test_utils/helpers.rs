// File: livecart-core/src/test_utils/helpers.rs

use sqlx::{Pool, Postgres, PgConnection, Connection};
use sqlx::postgres::PgPoolOptions;
use livecart_common::models::{Platform, RawComment};
use crate::Error;
use crate::db::Database;

const TEST_DB: &str = "livecart_test";

/// Create the test database if it does not exist yet.
pub async fn ensure_test_database_exists() -> Result<(), Error> {
    let admin_url = std::env::var("DATABASE_ADMIN_URL")
        .unwrap_or_else(|_| "postgres://livecart@localhost/postgres".to_string());
    let mut conn = PgConnection::connect(&admin_url).await?;

    let create_db_sql = format!("CREATE DATABASE {TEST_DB};");
    if let Err(e) = sqlx::query(&create_db_sql).execute(&mut conn).await {
        // 42P04 => duplicate_database
        let duplicate = e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code == "42P04")
            .unwrap_or(false);
        if !duplicate {
            return Err(Error::Database(e));
        }
    }
    Ok(())
}

/// Pool on `TEST_DATABASE_URL`, or the local `livecart_test` database.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| format!("postgres://livecart@localhost/{TEST_DB}"));

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query("TRUNCATE TABLE live_comments;")
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns a migrated, empty test DB handle.
pub async fn setup_test_database() -> Result<Database, Error> {
    ensure_test_database_exists().await?;
    let db = Database::from_pool(create_test_db_pool().await?);
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(db)
}

pub fn raw_comment(platform: Platform, username: &str, text: &str) -> RawComment {
    RawComment {
        platform,
        username: username.to_string(),
        user_id: format!("{}-{}", platform, username.to_lowercase()),
        comment_text: text.to_string(),
        comment_id: None,
        timestamp: None,
    }
}
