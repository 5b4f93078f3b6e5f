use std::process::ExitCode;

use clap::ArgMatches;
use server::config::Config;

pub async fn run(matches: &ArgMatches) -> ExitCode {
    let mut config = Config::from_env();
    if let Some(port) = matches.get_one::<u16>("port") {
        config = config.with_port(*port);
    }
    if let Some(public) = matches.get_one::<String>("public") {
        config = config.with_public_dir(public);
    }

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
