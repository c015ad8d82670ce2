use std::time::Duration;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::graph::BuildStats;
use crate::query::diff::DiffImpact;
use crate::query::impact::{CallerImpact, FileImpact};
use crate::query::map::ModuleRank;
use crate::query::symbol::SymbolReport;

/// Build summary in the JSON shape.
#[derive(Debug, Serialize)]
struct BuildSummary {
    file_count: usize,
    node_count: usize,
    edge_count: usize,
    skipped: usize,
    elapsed_secs: f64,
}

pub fn print_build_stats(stats: &BuildStats, elapsed: Duration, json: bool) {
    if json {
        let summary = BuildSummary {
            file_count: stats.files,
            node_count: stats.nodes,
            edge_count: stats.edges,
            skipped: stats.skipped,
            elapsed_secs: elapsed.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
        return;
    }

    println!(
        "Indexed {} files in {:.2}s: {} nodes, {} edges",
        stats.files,
        elapsed.as_secs_f64(),
        stats.nodes,
        stats.edges
    );
    if stats.skipped > 0 {
        println!("  skipped {} files (warnings above)", stats.skipped);
    }
}

pub fn print_symbols(reports: &[SymbolReport], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(reports),
        OutputFormat::Compact => {
            if reports.is_empty() {
                println!("no matching symbols");
                return;
            }
            for report in reports {
                println!(
                    "{} [{}] {}:{}",
                    report.node.name,
                    report.node.kind.as_str(),
                    report.node.file,
                    report.node.line
                );
                for caller in &report.callers {
                    let via = caller
                        .via
                        .as_deref()
                        .map(|v| format!(" via {v}"))
                        .unwrap_or_default();
                    let dynamic = if caller.dynamic { " dynamic" } else { "" };
                    println!(
                        "  <- {} {}:{} ({:.1}{dynamic}){via}",
                        caller.node.name, caller.node.file, caller.node.line, caller.confidence
                    );
                }
                for callee in &report.callees {
                    println!(
                        "  -> {} {}:{} ({:.1})",
                        callee.node.name, callee.node.file, callee.node.line, callee.confidence
                    );
                }
            }
        }
    }
}

pub fn print_file_impact(results: &[FileImpact], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Compact => {
            if results.is_empty() {
                println!("no dependents");
                return;
            }
            for result in results {
                println!("[{}] {}", result.depth, result.file);
            }
        }
    }
}

pub fn print_function_impact(results: &[CallerImpact], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Compact => {
            if results.is_empty() {
                println!("no callers");
                return;
            }
            for result in results {
                println!(
                    "[{}] {} [{}] {}:{}",
                    result.depth,
                    result.node.name,
                    result.node.kind.as_str(),
                    result.node.file,
                    result.node.line
                );
            }
        }
    }
}

pub fn print_module_map(ranks: &[ModuleRank], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(ranks),
        OutputFormat::Compact => {
            for rank in ranks {
                println!("{:>5}  {}", rank.inbound, rank.file);
            }
        }
    }
}

pub fn print_diff_impact(results: &[DiffImpact], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Compact => {
            if results.is_empty() {
                println!("no definitions affected");
                return;
            }
            for result in results {
                println!(
                    "{} [{}] {}:{}",
                    result.definition.name,
                    result.definition.kind.as_str(),
                    result.definition.file,
                    result.definition.line
                );
                for caller in &result.callers {
                    println!(
                        "  [{}] {} {}:{}",
                        caller.depth, caller.node.name, caller.node.file, caller.node.line
                    );
                }
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
