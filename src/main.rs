use clap::{Parser, Subcommand};
use randcaps::config::Config;
use randcaps::{logging, runtime};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "randcaps",
    version = VERSION,
    about = "Matrix bot that answers !randcaps with a random all-caps message from room history"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Connect and answer triggers until interrupted (default)
    Start,
    /// Load and validate configuration, then print it with secrets masked
    Check,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(MainCommand::Start) {
        MainCommand::Version => {
            println!("randcaps {VERSION}");
            Ok(())
        }
        MainCommand::Check => {
            let config = Config::load()?;
            println!("{}", config.redacted_summary());
            println!("Configuration OK.");
            Ok(())
        }
        MainCommand::Start => {
            let config = Config::load()?;
            match config.log_dir.as_deref() {
                Some(dir) => logging::init_logging(dir)?,
                None => logging::init_console_logging(),
            }
            runtime::run(config).await
        }
    }
}
