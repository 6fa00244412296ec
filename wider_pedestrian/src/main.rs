//! WIDER Pedestrian dataset tool.
//!
//! Subcommands: build/cache the ground-truth roidb, or evaluate a detections
//! file against ground truth.

mod cmd_eval;
mod cmd_roidb;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the ground-truth roidb and print dataset statistics.
    Roidb(cmd_roidb::RoidbArgs),
    /// Evaluate a detections JSON file against ground truth.
    Eval(cmd_eval::EvalArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    match args.command {
        Command::Roidb(args) => cmd_roidb::run(&args),
        Command::Eval(args) => cmd_eval::run(&args),
    }
}
