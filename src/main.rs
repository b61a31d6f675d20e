use clap::Parser;
use cycletrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
