//! srtp-context - SRTP/SRTCP key derivation and packet protection
//!
//! A small front-end over the `srtp_context` library for generating master
//! keys, inspecting derived session keys and protecting single packets.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::PacketArgs;
use config::Config;

#[derive(Parser)]
#[command(name = "srtp-context")]
#[command(about = "SRTP/SRTCP crypto contexts (RFC 3711)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random master key and salt for the configured policy
    Keygen {
        /// Store the key in the config file
        #[arg(short, long)]
        save: bool,
    },

    /// Print the derived session keys
    Derive {
        /// Packet index used for key derivation
        #[arg(short, long, default_value = "0")]
        index: u64,

        /// Derive SRTCP keys instead of SRTP keys
        #[arg(long)]
        rtcp: bool,
    },

    /// Protect one raw RTP/RTCP packet
    Protect {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Treat the packet as RTCP
        #[arg(long)]
        rtcp: bool,

        /// Roll-over counter of the RTP stream
        #[arg(long, default_value = "0")]
        roc: u32,

        /// SRTCP index for the packet
        #[arg(long, default_value = "0")]
        index: u32,
    },

    /// Verify and decrypt one SRTP/SRTCP packet
    Unprotect {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Treat the packet as SRTCP
        #[arg(long)]
        rtcp: bool,

        /// Roll-over counter of the RTP stream
        #[arg(long, default_value = "0")]
        roc: u32,
    },

    /// Run the built-in RFC 3711 known-answer tests
    Selftest,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Keygen { save } => {
            commands::keygen(&mut config, save, &config_path)?;
        }
        Commands::Derive { index, rtcp } => {
            commands::derive(&config, index, rtcp)?;
        }
        Commands::Protect {
            input,
            output,
            rtcp,
            roc,
            index,
        } => {
            tracing::debug!("Protecting {}", input.display());
            commands::protect(
                &config,
                &PacketArgs {
                    input: &input,
                    output: &output,
                    rtcp,
                    roc,
                    index,
                },
            )?;
        }
        Commands::Unprotect {
            input,
            output,
            rtcp,
            roc,
        } => {
            tracing::debug!("Unprotecting {}", input.display());
            commands::unprotect(
                &config,
                &PacketArgs {
                    input: &input,
                    output: &output,
                    rtcp,
                    roc,
                    index: 0,
                },
            )?;
        }
        Commands::Selftest => {
            tracing::info!("Running self-tests...");
            commands::selftest()?;
        }
    }

    Ok(())
}
