use std::process::ExitCode;

use clap::{arg, command, crate_name, value_parser, Command};

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = command!(crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand(Command::new(cli::VERSION_SUBCOMMAND).about(cli::VERSION_DESCRIPTION))
        .subcommand(Command::new(cli::BUGREPORT_SUBCOMMAND).about(cli::BUGREPORT_DESCRIPTION))
        .subcommand(
            Command::new(cli::SERVER_SUBCOMMAND)
                .about(cli::SERVER_DESCRIPTION)
                .arg(
                    arg!(-p --port <PORT>)
                        .required(false)
                        .value_parser(value_parser!(u16))
                        .help("Port to listen on (default IMGUP_PORT or 3000)"),
                )
                .arg(
                    arg!(--public <DIR>)
                        .required(false)
                        .help("Static assets root, uploads go into its uploads directory"),
                ),
        )
        .subcommand(
            Command::new(cli::UPLOAD_SUBCOMMAND)
                .about(cli::UPLOAD_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Server URI"))
                .arg(
                    arg!(-f --file <FILE>)
                        .required(true)
                        .help("Path to image to upload"),
                )
                .arg(
                    arg!(-t --mime <MIME>)
                        .required(false)
                        .help("MIME type to declare instead of the one guessed from extension"),
                )
                .arg(
                    arg!(--field <FIELD>)
                        .required(false)
                        .action(clap::ArgAction::Append)
                        .help("Extra form field as name=value, may be repeated"),
                ),
        )
        .arg_required_else_help(true)
        .disable_version_flag(true)
        .get_matches();

    if cli.subcommand_matches(cli::VERSION_SUBCOMMAND).is_some() {
        cli::version::run();
    } else if cli.subcommand_matches(cli::BUGREPORT_SUBCOMMAND).is_some() {
        cli::bugreport::run();
    } else if let Some(server_matches) = cli.subcommand_matches(cli::SERVER_SUBCOMMAND) {
        return cli::server::run(server_matches).await;
    } else if let Some(upload_matches) = cli.subcommand_matches(cli::UPLOAD_SUBCOMMAND) {
        cli::client::upload(upload_matches).await;
    }
    ExitCode::SUCCESS
}
