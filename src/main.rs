/*
 * Responsibility
 * - tokio runtime
 * - Call app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tokengate::app::run().await?;
    Ok(())
}
