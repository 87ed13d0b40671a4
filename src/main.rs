use anyhow::Result;
use askdesk::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
