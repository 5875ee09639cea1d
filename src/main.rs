mod cli;

use clap::Parser;

use camera_preview::config::Config;
use cli::{Args, Command, CommandError};

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn dispatch(args: Args) -> Result<(), CommandError> {
    let config_path = args.config.as_deref();
    let load = || Config::load(config_path);
    match args.command {
        Command::ListCameras => cli::list_cameras(&cli::simulated_platform(&load()?)),
        Command::Run(run) => cli::run(&load()?, &run),
        Command::SelectSize(select) => cli::select_size(&load()?, &select),
        Command::Convert(convert) => cli::convert(&convert),
        Command::Config { action } => cli::handle_config_action(action, config_path),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = dispatch(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
