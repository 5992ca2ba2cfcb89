//! stat command - Show what an address resolves to
//!
//! Resolves an address without walking it and prints the matched targets.

use clap::Args;
use gd_core::{Result, TraversalConfig};
use serde::Serialize;

use super::Session;
use crate::exit_code::ExitCode;
use crate::output::{Entry, Formatter, OutputConfig, nice_size, short_type};

/// Show what an address resolves to
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Address: gd://path, gd:<id>, gd:root or a shared link
    pub spec: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    spec: String,
    is_root: bool,
    is_folder: bool,
    /// Matched ids per level, root level first
    levels: Vec<usize>,
    targets: Vec<Entry>,
}

/// Execute the stat command
pub async fn execute(
    args: StatArgs,
    token: Option<String>,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let session = match Session::open(token, &formatter) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let params = session.config.defaults.to_run_params();
    let mut config = session.resolver.resolve(&args.spec, params).await;
    if let Some(error) = config.error() {
        formatter.spec_error(&args.spec, &error.message, error.code);
        return ExitCode::from(&error.error);
    }

    match describe(&mut config).await {
        Ok(output) => {
            print_stat(&output, &formatter);
            if output.targets.is_empty() {
                ExitCode::NotFound
            } else {
                ExitCode::Success
            }
        }
        Err(e) => {
            formatter.error(&format!("Failed to read resolved targets: {e}"));
            ExitCode::from(&e)
        }
    }
}

/// Summarize a resolved config; targets come from the cache only
async fn describe(config: &mut TraversalConfig) -> Result<StatOutput> {
    // the root marker's chunker lists children, the target is the root itself
    let targets = match (config.is_root, config.file.as_ref(), config.chunker.as_mut()) {
        (true, Some(root), _) => vec![root.clone()],
        (_, _, Some(chunker)) => chunker.collect_all().await?,
        _ => Vec::new(),
    };

    Ok(StatOutput {
        spec: config.spec.clone(),
        is_root: config.is_root,
        is_folder: config.is_folder,
        levels: config.unfolders.iter().map(Vec::len).collect(),
        targets: targets.iter().map(Entry::from).collect(),
    })
}

fn print_stat(output: &StatOutput, formatter: &Formatter) {
    if formatter.is_json() {
        formatter.json(output);
        return;
    }

    if output.targets.is_empty() {
        formatter.error(&format!("{}: no matches", output.spec));
    }

    for target in &output.targets {
        formatter.println(&format!("Path      : {}", target.path));
        formatter.println(&format!("Id        : {}", target.id));
        formatter.println(&format!("Type      : {}", short_type(&target.mime_type)));
        if let Some(size) = target.size {
            formatter.println(&format!("Size      : {size} bytes ({})", nice_size(Some(size))));
        }
        if let Some(modified) = target.modified {
            formatter.println(&format!(
                "Date      : {}",
                modified.strftime("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        formatter.println("");
    }

    for line in summary(output) {
        formatter.println(&line);
    }
}

/// Match count and per-level match counts
fn summary(output: &StatOutput) -> Vec<String> {
    let levels: Vec<String> = output.levels.iter().map(ToString::to_string).collect();
    let noun = if output.targets.len() == 1 { "match" } else { "matches" };
    vec![
        format!("Matches   : {} {noun}", output.targets.len()),
        format!("Levels    : {}", levels.join(" / ")),
    ]
}
