//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jsongate - chunked JSON over small-MTU links
#[derive(Debug, Parser)]
#[command(name = "jsongate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "JSONGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Frame a JSON message and print each chunk as hex
    Encode {
        /// JSON message, or `-` to read it from stdin
        json: String,

        /// Chunk size in bytes (defaults to link.mtu)
        #[arg(long)]
        mtu: Option<usize>,
    },

    /// Reassemble hex notifications and print the frames they complete
    Decode {
        /// One hex string per notification
        #[arg(required = true)]
        chunks: Vec<String>,
    },

    /// Fetch, save and re-fetch the configuration of an in-process device
    Loopback {
        /// Chunk size in bytes (defaults to link.mtu)
        #[arg(long)]
        mtu: Option<usize>,

        /// SSID to save on the device
        #[arg(long, default_value = "jsongate-loopback")]
        ssid: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_encode_with_mtu() {
        let cli = Cli::parse_from(["jsongate", "-v", "encode", "{}", "--mtu", "20"]);
        assert!(cli.debug);
        assert!(matches!(
            cli.command,
            Command::Encode { ref json, mtu: Some(20) } if json == "{}"
        ));
    }

    #[test]
    fn decode_requires_chunks() {
        assert!(Cli::try_parse_from(["jsongate", "decode"]).is_err());
    }
}
