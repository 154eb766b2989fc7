//! CLI interface for voiceline

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{self, Config};

#[derive(Parser)]
#[command(name = "voiceline")]
#[command(about = "Real-time voice agent server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the voice server
    Serve {
        /// Port to listen on (overrides the configured port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (overrides the configured host)
        #[arg(long)]
        host: Option<String>,
    },
    /// Inspect or change configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Store an API key in the system keyring (usage: --set-key provider key)
        #[arg(long, value_names = &["provider", "key"], num_args = 2)]
        set_key: Option<Vec<String>>,
        /// Remove a stored API key
        #[arg(long)]
        delete_key: Option<String>,
        /// List the provider names keys can be stored under
        #[arg(long)]
        list_providers: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = Config::load()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            crate::server::start(config).await?;
        }
        Commands::Config {
            show,
            set_key,
            delete_key,
            list_providers,
        } => {
            if let Some(pair) = set_key {
                let provider = &pair[0];
                crate::security::set_provider_key(provider, &pair[1])?;
                println!("{} API key stored securely in keyring.", provider);
            } else if let Some(provider) = delete_key {
                crate::security::delete_provider_key(&provider)?;
                println!("{} API key removed from keyring.", provider);
            } else if list_providers {
                for provider in crate::security::KNOWN_PROVIDERS {
                    println!("{}", provider);
                }
            } else if show {
                let config = Config::load()?;
                println!("Configuration file: {}", config::config_path()?.display());
                println!();
                print!("{}", toml::to_string_pretty(&config)?);
            } else {
                println!("Nothing to do. Try --show or --set-key.");
                println!("See: voiceline config --help");
            }
        }
    }

    Ok(())
}
