use anyhow::Result;
use blackice::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    Cli::parse().run()
}
