use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use project_guard::db::users::{self, NewUser};
use project_guard::models::user::{normalize_email, GlobalRole};
use project_guard::utils::{hash_password, validate_password_strength};

#[derive(Parser, Debug)]
#[command(author, version, about = "project-guard maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create a platform administrator. Registration only ever creates regular users.
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fall back to the crate-local `.env` when started from another directory.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::CreateAdmin { email, name, password } => {
            let pool = get_pool().await?;
            get_migrator().await?.run(&pool).await?;
            create_admin(&pool, &email, &name, &password).await?;
        }
    }

    Ok(())
}

async fn create_admin(pool: &SqlitePool, email: &str, name: &str, password: &str) -> anyhow::Result<()> {
    let email = normalize_email(email);
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("name must not be empty");
    }
    if let Err(err) = validate_password_strength(password) {
        anyhow::bail!(err.message.map(|m| m.to_string()).unwrap_or_else(|| "password too weak".to_string()));
    }

    let password_hash = hash_password(password)?;
    let user = users::insert(
        pool,
        NewUser {
            name,
            email: &email,
            password_hash: &password_hash,
            role: GlobalRole::Admin,
        },
    )
    .await
    .with_context(|| format!("failed to create admin {email}"))?;

    println!("Created admin {} ({})", user.email, user.id);
    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let options = SqliteConnectOptions::from_str(&database_url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // Nothing is applied until sqlx has created its bookkeeping table.
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;

    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when run from the repo root, else the crate's own folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
