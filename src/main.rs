use anyhow::Result;
use clap::Parser;

use edgegrid::cli::{self, Cli};

fn main() -> Result<()> {
    cli::run(Cli::parse())
}
