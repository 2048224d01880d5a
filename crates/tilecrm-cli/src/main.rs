mod promotions;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::promotions::PromotionsCommands;

#[derive(Debug, Parser)]
#[command(name = "tilecrm-cli")]
#[command(about = "Tile CRM promotion tooling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect and manage promotions
    Promotions {
        #[command(subcommand)]
        command: PromotionsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("tilecrm-cli: run with --help to list commands");
        return Ok(());
    };

    let config = tilecrm_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tilecrm_db::PoolConfig::from_app_config(&config);
    let pool = tilecrm_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                tilecrm_db::health_check(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = tilecrm_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
        },
        Commands::Promotions { command } => promotions::run(&pool, command).await?,
    }

    Ok(())
}
