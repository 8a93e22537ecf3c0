use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;

use bp_core::{
    compare, BranchGraph, ComparisonReport, MatchMode, MatchParams, DEFAULT_MAX_REPORT,
    DEFAULT_OBJDUMP,
};

pub const COMMAND_NAME: &str = "compare";

pub fn cli(command: Command) -> Command {
    command.subcommand(
        Command::new(COMMAND_NAME)
            .about("Extract a graph from a binary and match it against a prior graph.")
            .arg(
                Arg::new("binary")
                    .long("binary")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Binary to disassemble and compare"),
            )
            .arg(
                Arg::new("prior-graph")
                    .long("prior-graph")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Previously extracted graph JSON to compare against"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Where to write the comparison JSON"),
            )
            .arg(
                Arg::new("extracted-output")
                    .long("extracted-output")
                    .value_parser(value_parser!(PathBuf))
                    .help("Also write the newly extracted graph JSON here"),
            )
            .arg(
                Arg::new("collect-all-sizes")
                    .long("collect-all-sizes")
                    .action(ArgAction::SetTrue)
                    .help("Report matches at every size instead of only the best one"),
            )
            .arg(
                Arg::new("min-size")
                    .long("min-size")
                    .value_parser(value_parser!(u32))
                    .default_value("4")
                    .help("Smallest window size to consider"),
            )
            .arg(
                Arg::new("size-filter")
                    .long("size-filter")
                    .value_parser(value_parser!(u32))
                    .help("Report only matches of exactly this size"),
            )
            .arg(
                Arg::new("max-report")
                    .long("max-report")
                    .value_parser(value_parser!(u32))
                    .help("Cap on reported matches [default: 200, or 1 in best-size mode]"),
            )
            .arg(
                Arg::new("objdump")
                    .long("objdump")
                    .default_value(DEFAULT_OBJDUMP)
                    .help("Disassembler executable to invoke"),
            ),
    )
}

pub fn main(submatches: &ArgMatches) -> Result<()> {
    let binary = submatches.get_one::<PathBuf>("binary").unwrap();
    let prior_path = submatches.get_one::<PathBuf>("prior-graph").unwrap();
    let output = submatches.get_one::<PathBuf>("output").unwrap();
    let extracted_output = submatches.get_one::<PathBuf>("extracted-output");
    let objdump = submatches.get_one::<String>("objdump").unwrap();

    let mode = if submatches.get_flag("collect-all-sizes") {
        MatchMode::AllSizes
    } else {
        MatchMode::BestSize
    };
    let params = MatchParams {
        mode,
        min_size: *submatches.get_one::<u32>("min-size").unwrap(),
        size_filter: submatches.get_one::<u32>("size-filter").copied(),
        max_report: submatches
            .get_one::<u32>("max-report")
            .copied()
            .unwrap_or(match mode {
                MatchMode::AllSizes => DEFAULT_MAX_REPORT,
                MatchMode::BestSize => 1,
            }),
    };

    let new_graph = super::extract_graph(objdump, binary)?;
    let prior_graph = BranchGraph::load(prior_path)
        .with_context(|| format!("failed to load {}", prior_path.display()))?;

    let outcome = compare(&prior_graph, &new_graph, &params);
    info!(
        "best match size {}, {} matches reported",
        outcome.best_match_size, outcome.match_count_reported
    );

    let report = ComparisonReport::new(&prior_graph, &new_graph, &params, outcome);
    report
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if let Some(path) = extracted_output {
        new_graph
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
