//! HLS-VI CLI entrypoint.
//!
//! Provides a thin wrapper over the `cli` module: parse args, dispatch to
//! index computation (single granule or batch) or metadata generation, and
//! exit with appropriate status. For programmatic use, prefer the library
//! API (`hlsvi::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
