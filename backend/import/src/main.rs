use std::path::PathBuf;

use anyhow::{Context, Result};
use census::{ETU_WARD, RedisStore};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV export with Date, Shift_ID and ETU_* columns
    csv_path: PathBuf,

    #[arg(long, default_value = ETU_WARD)]
    ward: String,

    /// Append instead of replacing the ward's census history
    #[arg(long)]
    keep_existing: bool,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[arg(long, env = "STORE_PREFIX", default_value = "hospital")]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let store = RedisStore::connect(&args.redis_url, &args.prefix)
        .await
        .context("Failed to connect to Redis")?;

    let summary =
        import::load_history(&store, &args.csv_path, &args.ward, args.keep_existing).await?;

    println!("\nCleared Entries: {}", summary.cleared);
    println!("Imported Entries: {}", summary.imported);

    Ok(())
}
