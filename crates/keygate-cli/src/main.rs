//! Keygate CLI - Headless license-pipeline toolkit
//!
//! Features:
//! - Catalog feed inspection and validation
//! - Portal token exchange
//! - Media source / key-system probing
//! - End-to-end license-proxy checks

use clap::{Parser, Subcommand};

mod commands;

/// Keygate CLI - DRM license pipeline toolkit
#[derive(Parser)]
#[command(name = "keygate-cli")]
#[command(version)]
#[command(about = "License-acquisition pipeline inspection and checks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a catalog feed and list its records
    Catalog {
        /// URL of the JSON feed, or path to a local file
        source: String,

        /// Check playback invariants and source selection per record
        #[arg(long)]
        validate: bool,
    },

    /// Perform a token exchange against a portal
    Token {
        /// Portal base URL
        portal: String,

        /// Portal username (empty uses the portal default)
        #[arg(short, long, default_value = "")]
        username: String,

        /// Portal password (empty uses the portal default)
        #[arg(short, long, default_value = "")]
        password: String,

        /// Asset identifier (empty becomes the literal "test")
        #[arg(short, long, default_value = "")]
        asset: String,

        /// Entitlement identifier (omitted from the request when empty)
        #[arg(long, default_value = "")]
        entitlement: String,

        /// Policy identifier (omitted from the request when empty)
        #[arg(long, default_value = "")]
        policy: String,
    },

    /// Show the protocol handler and key system for a URL/scheme pair
    Probe {
        /// Media URL
        url: String,

        /// DRM scheme tag (widevine, playready, clearkey)
        scheme: String,
    },

    /// Send a key request to a license proxy
    License {
        /// License-proxy URL
        proxy: String,

        /// Bearer token for the Authorization header
        #[arg(short, long, default_value = "")]
        token: String,

        /// Opaque key-request payload, base64-encoded
        #[arg(long, default_value = "")]
        payload_b64: String,

        /// DRM scheme tag (widevine, playready, clearkey)
        #[arg(short, long, default_value = "widevine")]
        scheme: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(level).init();

    match cli.command {
        Commands::Catalog { source, validate } => {
            commands::catalog(&source, validate, &cli.format).await?;
        }
        Commands::Token {
            portal,
            username,
            password,
            asset,
            entitlement,
            policy,
        } => {
            commands::token(&portal, &username, &password, &asset, &entitlement, &policy).await?;
        }
        Commands::Probe { url, scheme } => {
            commands::probe(&url, &scheme, &cli.format)?;
        }
        Commands::License {
            proxy,
            token,
            payload_b64,
            scheme,
        } => {
            commands::license(&proxy, &token, &payload_b64, &scheme).await?;
        }
    }

    Ok(())
}
