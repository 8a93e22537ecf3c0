use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};

use bp_core::DEFAULT_OBJDUMP;

pub const COMMAND_NAME: &str = "extract";

pub fn cli(command: Command) -> Command {
    command.subcommand(
        Command::new(COMMAND_NAME)
            .about("Disassemble a binary and write its conditional-branch graph as JSON.")
            .arg(
                Arg::new("binary")
                    .long("binary")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Binary to disassemble"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Where to write the graph JSON"),
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
    let output = submatches.get_one::<PathBuf>("output").unwrap();
    let objdump = submatches.get_one::<String>("objdump").unwrap();

    let graph = super::extract_graph(objdump, binary)?;
    graph
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(())
}
