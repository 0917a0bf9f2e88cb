use anyhow::Result;
use floatchat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
