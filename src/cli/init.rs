use anyhow::Result;
use std::fs;

use crate::core::AppConfig;
use crate::core::db::ready_db;

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing db...");
    fs::create_dir_all(&config.storage_path)
        .unwrap_or_else(|err| println!("Ignoring storage directory create failed: {}", err));

    ready_db(&config.db_path).await?;
    println!("Finished initializing db at {}", config.db_path);

    Ok(())
}
