use anyhow::Result;
use clap::Command;

mod cli;

fn main() -> Result<()> {
    env_logger::init();

    let command = Command::new("branchprint")
        .about("Structural fingerprinting of binaries via conditional-branch graphs.")
        .subcommand_required(true)
        .arg_required_else_help(true);

    let command = cli::extract::cli(command);
    let command = cli::compare::cli(command);

    let matches = command.get_matches();
    match matches.subcommand() {
        Some((cli::extract::COMMAND_NAME, sub_m)) => cli::extract::main(sub_m),
        Some((cli::compare::COMMAND_NAME, sub_m)) => cli::compare::main(sub_m),
        _ => unreachable!(),
    }
}
