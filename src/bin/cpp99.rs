use clap::Parser;
use cpp99::cli::Args;

fn main() {
    let args = Args::parse();
    std::process::exit(cpp99::cli::run(args));
}
