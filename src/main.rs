//! Cutter CLI - Lightweight client for the Cutter voice helper
//!
//! A terminal client for the Cutter backend: caller identification, chat,
//! session mode, and realtime voice-call session credentials.

mod api;
mod call;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::call::ProvideCredential;

#[derive(Parser)]
#[command(name = "cutter-cli")]
#[command(about = "Lightweight CLI client for the Cutter voice helper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an ephemeral realtime session credential
    Session,

    /// Initiate the caller-identification flow for a phone number
    Call {
        /// Phone number in E.164 form
        number: String,
    },

    /// Verify (or register) the caller's name for a phone number
    VerifyName {
        /// Phone number in E.164 form
        number: String,

        /// Caller's name
        name: String,
    },

    /// Send a chat message
    Send {
        /// Session ID (from `verify-name` output)
        #[arg(short, long)]
        session: String,

        /// Message content
        message: String,
    },

    /// Switch session mode
    Mode {
        /// Session ID (from `verify-name` output)
        #[arg(short, long)]
        session: String,

        /// New mode: text or voice
        mode: String,
    },

    /// Start or stop voice mode for a session
    Voice {
        #[command(subcommand)]
        action: VoiceAction,
    },

    /// Exchange a canned SDP offer with the realtime endpoint (debug)
    Probe {
        /// Path to a file containing the offer SDP
        offer: std::path::PathBuf,
    },

    /// Show or update saved endpoint configuration
    Config {
        /// Set the backend base URL (empty string resets to the default)
        #[arg(long)]
        backend_url: Option<String>,

        /// Set the realtime negotiation endpoint (empty string resets to the default)
        #[arg(long)]
        realtime_url: Option<String>,
    },

    /// Check backend health
    Health,
}

#[derive(Subcommand)]
enum VoiceAction {
    /// Start voice mode
    Start {
        /// Session ID (from `verify-name` output)
        #[arg(short, long)]
        session: String,

        /// Voice to use
        #[arg(long, default_value = "alloy")]
        voice: String,
    },

    /// Stop voice mode
    Stop {
        /// Session ID (from `verify-name` output)
        #[arg(short, long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Session => {
            tracing::info!("Requesting realtime session credential...");
            fetch_session().await?;
        }
        Commands::Call { number } => {
            api::start_call(&number).await?;
        }
        Commands::VerifyName { number, name } => {
            api::verify_name(&number, &name).await?;
        }
        Commands::Send { session, message } => {
            tracing::info!("Sending message...");
            api::send_message(&session, &message).await?;
        }
        Commands::Mode { session, mode } => {
            api::switch_mode(&session, &mode).await?;
        }
        Commands::Voice { action } => match action {
            VoiceAction::Start { session, voice } => {
                api::voice_start(&session, &voice).await?;
            }
            VoiceAction::Stop { session } => {
                api::voice_stop(&session).await?;
            }
        },
        Commands::Probe { offer } => {
            let offer_sdp = std::fs::read_to_string(&offer)
                .with_context(|| format!("Failed to read offer SDP from {}", offer.display()))?;
            call::probe::run_probe(offer_sdp).await?;
        }
        Commands::Config {
            backend_url,
            realtime_url,
        } => {
            let mut config = config::Config::load()?;
            if config.set_endpoints(backend_url, realtime_url) {
                config.save()?;
                tracing::info!("Configuration saved");
            }
            println!();
            println!("Backend URL:  {}", config.backend_url());
            println!("Realtime URL: {}", config.realtime_url());
        }
        Commands::Health => {
            api::health().await?;
        }
    }

    Ok(())
}

/// Fetch a session credential from the backend and print it (secret
/// truncated).
async fn fetch_session() -> Result<()> {
    let config = config::Config::load()?;
    let fetcher = call::CredentialFetcher::new(config.backend_url());
    let credential = fetcher.fetch().await?;

    let secret_prefix: String = credential.client_secret.chars().take(8).collect();
    println!();
    println!("Model:      {}", credential.model);
    if let Some(expires_at) = &credential.expires_at {
        println!("Expires at: {}", expires_at);
    }
    println!("Secret:     {}…", secret_prefix);
    Ok(())
}
