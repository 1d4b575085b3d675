//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{OutputFormat, ShardMergeArgs};
use crate::error::Result;

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(
    message: &str,
    result: &T,
    args: &ShardMergeArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &ShardMergeArgs) -> Result<()> {
    if args.verbosity() == 0 {
        return Ok(());
    }
    println!("{message}");

    if args.verbosity() > 1 {
        println!();
        let value = serde_json::to_value(result)?;
        if let Some(obj) = value.as_object() {
            for (key, value) in obj {
                println!("{}: {}", key.replace('_', " "), format_value(value));
            }
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &ShardMergeArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) if items.is_empty() => "none".to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
