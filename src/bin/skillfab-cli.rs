//! Headless CLI entry point.

use clap::Parser;

use skillfab_lib::cli::{run, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run(args).await
}
