//! Command implementations for the shard-merge CLI.

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::Result;
use crate::parser::validate_shards;
use crate::pipeline::ShardMerger;
use crate::shard::ShardCursorTable;

/// Execute a CLI command.
pub fn execute_command(args: ShardMergeArgs) -> Result<()> {
    match &args.command {
        Command::Merge(merge_args) => merge_shards(merge_args, &args),
        Command::Validate(validate_args) => validate(validate_args, &args),
    }
}

/// Merge every shard of the input directory.
fn merge_shards(args: &MergeArgs, cli_args: &ShardMergeArgs) -> Result<()> {
    let config = args.to_config()?;
    if cli_args.verbosity() > 1 {
        println!("Merging shards from: {}", config.input_dir.display());
        println!("Writing index to: {}", config.output_path.display());
    }

    let summary = ShardMerger::new(config)?.run()?;

    let message = format!(
        "MERGED! {} terms from {} shards written to {}",
        summary.terms,
        summary.shards,
        summary.output_path.display()
    );
    output_result(&message, &summary, cli_args)
}

/// Parse every shard line without writing an index.
fn validate(args: &ValidateArgs, cli_args: &ShardMergeArgs) -> Result<()> {
    let mut table = ShardCursorTable::discover(&args.input_dir, None)?;
    let report = validate_shards(&mut table)?;

    output_result("All shards are well formed", &report, cli_args)
}
