//! ls command - List files and folders
//!
//! Resolves an address and walks it, printing one row per file and folder.

use std::collections::BTreeMap;

use clap::Args;
use gd_core::{
    Defaults, Emitter, Error, Event, EventStats, Lister, RunParams, TraversalConfig, traverse,
};
use serde::Serialize;

use super::Session;
use crate::exit_code::ExitCode;
use crate::output::{Entry, Formatter, OutputConfig, ProgressBar, entry_table};

/// List files and folders
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Address: gd://path, gd:<id>, gd:root or a shared link
    #[arg(default_value = "gd://")]
    pub spec: String,

    /// Descend into folders
    #[arg(short, long, overrides_with = "no_recurse")]
    pub recurse: bool,

    /// Do not descend into folders, even when the config says to
    #[arg(long, overrides_with = "recurse")]
    pub no_recurse: bool,

    /// Sort expression, e.g. "name asc,modifiedTime desc"
    #[arg(short, long)]
    pub order_by: Option<String>,

    /// Maximum number of files to list
    #[arg(short, long)]
    pub max_items: Option<u64>,

    /// Skip this many leading items of the top-level listing
    #[arg(long)]
    pub offset: Option<u64>,

    /// Items requested per page
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub chunk_size: Option<u32>,

    /// Print only paths
    #[arg(short, long, overrides_with = "no_brief")]
    pub brief: bool,

    /// Print the full table, even when the config says brief
    #[arg(long, overrides_with = "brief")]
    pub no_brief: bool,

    /// Print event counts after the listing
    #[arg(long)]
    pub stats: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    spec: String,
    items: Vec<Entry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<BTreeMap<&'static str, u64>>,
}

/// What a walk produced for display
#[derive(Debug, Default)]
struct Listing {
    entries: Vec<Entry>,
    errors: Vec<Error>,
    stats: EventStats,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, token: Option<String>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let session = match Session::open(token, &formatter) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let params = run_params(&args, &session.config.defaults);
    let brief = switch(args.brief, args.no_brief, session.config.defaults.brief);

    let mut config = session.resolver.resolve(&args.spec, params).await;
    if let Some(error) = config.error() {
        formatter.spec_error(&args.spec, &error.message, error.code);
        return ExitCode::from(&error.error);
    }

    let listing = list(session.resolver.lister(), &mut config, &formatter).await;
    print_listing(&args, brief, &listing, &formatter);

    match listing.errors.first() {
        Some(error) => ExitCode::from(error),
        None => ExitCode::Success,
    }
}

/// Merge command-line flags over the configured defaults
fn run_params(args: &LsArgs, defaults: &Defaults) -> RunParams {
    let base = defaults.to_run_params();
    RunParams {
        recurse: switch(args.recurse, args.no_recurse, base.recurse),
        order_by: args.order_by.clone().or(base.order_by),
        max_items: args.max_items.or(base.max_items),
        offset: args.offset.unwrap_or(base.offset),
        chunk_size: args.chunk_size.unwrap_or(base.chunk_size),
    }
}

/// An on/off flag pair over a configured default
fn switch(on: bool, off: bool, default: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

/// Walk the config, collecting a row per file and folder event
async fn list(lister: &Lister, config: &mut TraversalConfig, formatter: &Formatter) -> Listing {
    let spinner = ProgressBar::spinner(formatter.config(), &format!("listing {}", config.spec));
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    let stats = {
        let mut emitter = Emitter::new();
        emitter.on_any(|event| match event {
            Event::File { node, .. } => {
                entries.push(Entry::from(*node));
                spinner.inc(1);
            }
            Event::Folder { node, .. } => {
                entries.push(Entry::from(*node));
                spinner.inc(1);
                if let Some(path) = &node.file_path {
                    spinner.set_message(&format!("listing {path}"));
                }
            }
            Event::Error { error, .. } => errors.push((*error).clone()),
            _ => {}
        });
        traverse(lister, config, &mut emitter).await;
        emitter.stats().clone()
    };
    spinner.finish_and_clear();

    Listing {
        entries,
        errors,
        stats,
    }
}

fn print_listing(args: &LsArgs, brief: bool, listing: &Listing, formatter: &Formatter) {
    let stats: BTreeMap<&'static str, u64> = listing
        .stats
        .iter()
        .map(|(kind, count)| (kind.name(), count))
        .collect();

    if formatter.is_json() {
        formatter.json(&LsOutput {
            spec: args.spec.clone(),
            items: listing.entries.clone(),
            errors: listing.errors.iter().map(ToString::to_string).collect(),
            stats: args.stats.then_some(stats),
        });
        return;
    }

    if brief {
        for entry in &listing.entries {
            formatter.println(&entry.path);
        }
    } else if !listing.entries.is_empty() {
        let now = jiff::Zoned::now();
        let table = entry_table(&listing.entries, now.date(), now.time_zone());
        formatter.println(&table.to_string());
    }

    for error in &listing.errors {
        formatter.error(&error.to_string());
    }

    if args.stats {
        formatter.println("");
        for (kind, count) in listing.stats.iter() {
            formatter.println(&format!("{} {count}", formatter.dim(&format!("{kind:>10}"))));
        }
    }
}
