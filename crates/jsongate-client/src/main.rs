//! jsongate CLI entry point.

use std::io::Read;
use std::process::ExitCode;

use clap::Parser;

use jsongate_client::cli::{Cli, Command, ConfigAction};
use jsongate_client::commands;
use jsongate_client::config::ClientConfig;
use jsongate_client::error::ClientResult;
use jsongate_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(config.tracing(cli.debug)) {
        eprintln!("warning: {}", e);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
}

async fn run(cli: Cli, config: ClientConfig) -> ClientResult<()> {
    match cli.command {
        Command::Encode { json, mtu } => {
            let json = if json == "-" {
                let mut input = String::new();
                std::io::stdin().read_to_string(&mut input)?;
                input
            } else {
                json
            };
            commands::codec::encode(&json, mtu.unwrap_or(config.link.mtu))
        }
        Command::Decode { chunks } => commands::codec::decode(&chunks),
        Command::Loopback { mtu, ssid } => {
            let settings = match mtu {
                Some(mtu) => config.link.clone().with_mtu(mtu),
                None => config.link.clone(),
            };
            commands::loopback::run(&settings, &ssid).await
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, cli.config.as_deref()),
            ConfigAction::Path => commands::config::path(cli.config.as_deref()),
        },
    }
}
