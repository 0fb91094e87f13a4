use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    inspect::{self, InspectArgs},
    run::{self, RunArgs},
    version::{self, VersionArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "ifu", about = "IFU datacube reduction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute the enabled steps of a recipe against one target.
    Run(RunArgs),
    /// Print the sections of a product file.
    Inspect(InspectArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Inspect(args) => inspect::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
