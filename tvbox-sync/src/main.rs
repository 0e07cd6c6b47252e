use anyhow::Result;
use clap::Parser;
use tvbox_sync::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "tvbox-sync exited with error");
    }
    result
}
