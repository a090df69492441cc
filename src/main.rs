use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use finance_tracker::repositories::{MemoryStore, PgStore};
use finance_tracker::{services, settings::Settings};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    init_logging(&args.log4rs)?;
    let settings = Settings::load(&args.config)?;
    let listen = args.listen.unwrap_or(settings.http.listen);

    log::info!("Starting finance tracker.");
    match settings.postgres {
        Some(postgres) => {
            let conn = PgPoolOptions::new()
                .max_connections(postgres.max_connections)
                .connect(&postgres.url)
                .await?;
            let store = PgStore::new(conn);
            store.migrate().await?;

            services::start_services(Arc::new(store), &listen).await
        }
        None => {
            log::warn!("No [postgres] section configured, records are kept in memory.");
            services::start_services(Arc::new(MemoryStore::new()), &listen).await
        }
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
