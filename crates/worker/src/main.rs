//! Tender worker - drains the source queue once and reports what it routed.

use worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env when present
    dotenvy::dotenv().ok();

    let config = WorkerConfig::load()?;
    let summary = worker::start_worker(config).await?;
    println!("{summary}");

    Ok(())
}
