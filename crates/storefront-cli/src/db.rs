//! `db` subcommands. Each one loads the app config and opens its own pool.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database answers a trivial query
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load the catalog seed file into the database
    Seed {
        /// Seed file to load; defaults to `STOREFRONT_CATALOG_PATH`
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub(crate) async fn run(command: DbCommands) -> anyhow::Result<()> {
    let config = storefront_core::load_app_config()?;
    let pool_config = storefront_db::PoolConfig::from_app_config(&config);
    let pool = storefront_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        DbCommands::Ping => {
            storefront_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = storefront_db::run_migrations(&pool).await?;
            tracing::info!(applied, "migrations complete");
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed { path } => {
            let path = path.unwrap_or(config.catalog_path);
            let catalog = storefront_core::load_catalog(&path)?;
            storefront_db::run_migrations(&pool).await?;
            let summary = storefront_db::seed_catalog(&pool, &catalog).await?;
            tracing::info!(
                path = %path.display(),
                categories = summary.categories,
                products = summary.products,
                variations = summary.variations,
                "catalog seeded"
            );
            println!(
                "seeded {} categories, {} products, {} variations",
                summary.categories, summary.products, summary.variations
            );
        }
    }

    pool.close().await;
    Ok(())
}
