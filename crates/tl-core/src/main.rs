use clap::Parser;
use tl_core::cli::{run, Cli};
use tl_core::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);
    let code = run(cli);
    std::process::exit(code.as_i32());
}
