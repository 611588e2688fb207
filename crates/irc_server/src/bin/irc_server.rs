use clap::Parser;
use irc_server::config::Cli;
use irc_server::directory::Directory;
use irc_server::roster;
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    irc_server::logging::init(cli.log_level());

    let config = match cli.into_server_config() {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let roster = match &config.network {
        Some(path) => match roster::load(path) {
            Ok(entries) => match roster::require_self(&entries, &config.server_name) {
                Ok(()) => entries,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    info!("starting {} as '{}'", irc_server::SERVER_VERSION, config.server_name);
    let dir = Arc::new(Directory::new(config.server_name, config.oper_password, None, roster));

    if let Err(e) = irc_server::acceptor::run(dir, config.port).await {
        error!("acceptor exited: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
