use anyhow::Result;
use clap::Parser;
use tempo_regional::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    tempo_regional::run(cli).await
}
