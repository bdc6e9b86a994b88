//! m3rula - guided restores with turdusra1n / turdus_merula

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    m3rula::cli::run().await
}
