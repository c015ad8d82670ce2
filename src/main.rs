mod cli;
mod diff;
mod graph;
mod language;
mod output;
mod parser;
mod query;
mod resolver;
mod store;
mod walker;
mod watcher;

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use language::Capabilities;
use store::{STORE_DIR, STORE_FILE, Store};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build { path, verbose, json } => {
            let mut store = open_for_build(&path)?;
            let caps = Capabilities::probe();
            let start = Instant::now();
            let (_state, stats) = graph::build_graph(&path, &mut store, caps, verbose)?;
            output::print_build_stats(&stats, start.elapsed(), json);
        }

        Commands::Watch { path } => {
            let mut store = open_for_build(&path)?;
            let caps = Capabilities::probe();
            let start = Instant::now();
            let (mut state, stats) = graph::build_graph(&path, &mut store, caps, false)?;
            output::print_build_stats(&stats, start.elapsed(), false);
            watcher::watch(&path, &mut store, &mut state)?;
        }

        Commands::Symbol {
            name,
            path,
            exclude_tests,
            format,
        } => {
            let store = open_for_query(&path)?;
            let reports = query::symbol::lookup_symbol(&store, &name, exclude_tests)?;
            output::print_symbols(&reports, &format);
        }

        Commands::Impact {
            file,
            path,
            exclude_tests,
            format,
        } => {
            let store = open_for_query(&path)?;
            let results = query::impact::file_impact(&store, &file, exclude_tests)?;
            output::print_file_impact(&results, &format);
        }

        Commands::Callers {
            name,
            path,
            depth,
            exclude_tests,
            format,
        } => {
            let store = open_for_query(&path)?;
            let results = query::impact::function_impact(&store, &name, depth, exclude_tests)?;
            output::print_function_impact(&results, &format);
        }

        Commands::Map { path, limit, format } => {
            let store = open_for_query(&path)?;
            let ranks = query::map::module_map(&store, limit)?;
            output::print_module_map(&ranks, &format);
        }

        Commands::Diff {
            path,
            depth,
            exclude_tests,
            format,
        } => {
            let store = open_for_query(&path)?;
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            let changes = diff::parse_unified_diff(&text);
            let results = query::diff::diff_impact(&store, &changes, depth, exclude_tests)?;
            output::print_diff_impact(&results, &format);
        }
    }

    Ok(())
}

/// Builds write to the workspace's own store directory.
fn open_for_build(root: &Path) -> Result<Store> {
    Store::open(&root.join(STORE_DIR).join(STORE_FILE))
}

/// Queries walk upward to the nearest store and open it read-only.
fn open_for_query(start: &Path) -> Result<Store> {
    Store::open_readonly(&Store::discover(start))
}
