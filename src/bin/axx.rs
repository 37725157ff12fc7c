use std::env;
use std::process::ExitCode;

use axx::cli;
use axx::logging;

fn main() -> ExitCode {
    let raw: Vec<String> = env::args().skip(1).collect();

    let Some(args) = cli::parse_args(&raw) else {
        println!("{}", cli::usage());
        return ExitCode::SUCCESS;
    };

    // spec.md §6 / SPEC_FULL.md §6: exit status is always 0, matching the
    // batch-assembler-driven-by-a-human transcript the original prints to;
    // fatal errors still abort the run, they just don't change the exit code
    if let Err(e) = cli::run(args) {
        logging::error(e.to_string());
    }
    ExitCode::SUCCESS
}
