use clap::{Parser, Subcommand};

pub mod config;
pub mod key;
pub mod logging;
pub mod run;
pub mod verify;
pub mod version;

#[derive(Parser)]
#[command(name = "anker")]
#[command(author = "Anker Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telegram bot that turns translated words into Anki cards", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.config/anker/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the hex pepper key (container-native)
        /// Falls back to the ANKER_PEPPER_KEY env var
        #[arg(long)]
        key_file: Option<String>,
    },

    /// Generate a new pepper key for secret encryption
    GenerateKey,

    /// Verify configuration and secrets without contacting any service
    Verify {
        /// Path to config file (default: ~/.config/anker/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the hex pepper key
        #[arg(long)]
        key_file: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config, key_file } => run::execute(config, key_file).await,
        Commands::GenerateKey => {
            let key = anker::crypto::generate_pepper_key()?;
            println!("{}", key);
            eprintln!("Store this key safely: losing it makes saved account secrets unreadable.");
            Ok(())
        }
        Commands::Verify { config, key_file } => verify::execute(config, key_file).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
