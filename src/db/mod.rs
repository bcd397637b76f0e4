use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub mod projects;
pub mod security_events;
pub mod users;

pub async fn init(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.context("invalid DATABASE_URL")?
		.create_if_missing(true)
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(options)
		.await
		.context("failed to connect to database")?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(pool)
}

/// True when the error is the store rejecting a duplicate on a unique index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
		_ => false,
	}
}
