/// ezbox entry point
///
/// Thin wrapper that delegates to the library crate.
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ezbox_lib::run(ezbox_lib::cli::Cli::parse()).await
}
