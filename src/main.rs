mod cli;

use clap::Parser;
use cli::Cli;
use img2bezier::{convert, ConvertOptions};
use std::process;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let Some(input) = cli.input else {
        process::exit(-1);
    };

    let options = ConvertOptions {
        scale: cli.scale,
        color: cli.color,
    };
    if let Err(error) = convert(&input, &cli.output, &options) {
        eprintln!("Exception occured: {error}");
        process::exit(1);
    }
}
