//! CLI invocation surface (§6, C9): a `clap`-derived argument struct, plus
//! the validation (`-n` requires `-s`) that the source left to a manual
//! check before any socket is opened.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "irc_server", version, about = "A multi-user IRC server")]
pub struct Cli {
    /// Operator password, required to OPER up.
    #[arg(short = 'o', long = "oper-password")]
    pub oper_password: String,

    /// Port to listen on in standalone mode.
    #[arg(short = 'p', long = "port", default_value_t = 6667)]
    pub port: u16,

    /// This node's network identifier. Required when `-n` is given.
    #[arg(short = 's', long = "server-name")]
    pub server_name: Option<String>,

    /// Roster file enabling network mode.
    #[arg(short = 'n', long = "network")]
    pub network: Option<PathBuf>,

    /// Increase log verbosity (-v = DEBUG, -vv = TRACE).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode: only WARN and above, overrides -v.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub server_name: String,
    pub oper_password: String,
    pub port: u16,
    pub network: Option<PathBuf>,
}

impl Cli {
    /// Resolves the parsed args into a `ServerConfig`, applying the
    /// "-n without -s" validation rule. Returns a human-readable error
    /// instead of panicking so `main` can print it and exit non-zero.
    pub fn into_server_config(self) -> Result<ServerConfig, String> {
        if self.network.is_some() && self.server_name.is_none() {
            return Err("-n/--network requires -s/--server-name".to_string());
        }
        let server_name = self
            .server_name
            .unwrap_or_else(|| "localhost".to_string());
        Ok(ServerConfig {
            server_name,
            oper_password: self.oper_password,
            port: self.port,
            network: self.network,
        })
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Warn
        } else {
            match self.verbose {
                0 => log::LevelFilter::Info,
                1 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            }
        }
    }
}
