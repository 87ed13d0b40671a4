use anyhow::Result;

use crate::api::public::history::HistoryRecord;
use crate::chat::render::{format_timestamp, prompt_preview};
use crate::core::AppConfig;
use crate::core::db::ready_db;
use crate::history::find_recent_records;

pub async fn run(config: &AppConfig, identity: &str, limit: usize, json: bool) -> Result<()> {
    let db = ready_db(&config.db_path).await?;
    let records = find_recent_records(&db, identity, limit).await?;

    if json {
        let records: Vec<HistoryRecord> = records.into_iter().map(HistoryRecord::from).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No saved prompts yet");
        return Ok(());
    }

    for record in records {
        println!(
            "[{}] {}\n{}\n",
            format_timestamp(&record.created_at),
            prompt_preview(&record.prompt),
            record.response
        );
    }

    Ok(())
}
