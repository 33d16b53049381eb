use crate::{config::Config, logger, monitor};
use clap::{Arg, ArgAction, Command};
use slog::info;

pub const CONFIG: &str = "config";
pub const DEBUG: &str = "debug";

pub fn app() -> Command {
    Command::new("validator_watch")
        .about("Monitors a set of Ethereum consensus validators via a beacon node")
        .arg(
            Arg::new(CONFIG)
                .long(CONFIG)
                .short('c')
                .value_name("PATH")
                .help("Path to the YAML configuration file")
                .action(ArgAction::Set)
                .default_value("config.yaml"),
        )
        .arg(
            Arg::new(DEBUG)
                .long(DEBUG)
                .short('d')
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
}

pub async fn run() -> Result<(), String> {
    let matches = app().get_matches();

    let config_path = matches
        .get_one::<String>(CONFIG)
        .map(String::as_str)
        .unwrap_or("config.yaml");
    let config = Config::load_from_file(config_path)?;

    let log = logger::build_logger(matches.get_flag(DEBUG));
    info!(
        log,
        "Starting validator monitor";
        "config" => config_path,
        "beacon_node_url" => &config.beacon_node_url,
        "validators" => config.validators.len(),
    );

    monitor::run_monitor(config, log).await
}
