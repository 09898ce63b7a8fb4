mod config;
mod dropbox;
mod engine;
mod error;
mod models;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{load_token, Cli, Settings, USAGE};
use dropbox::DropboxClient;
use engine::{load_previous, run};

fn setup_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    let settings = match Settings::from_cli(cli) {
        Some(s) => s,
        None => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    let previous = load_previous(settings.previous_manifest.as_deref());

    let token = load_token(&settings.key_file)
        .with_context(|| format!("reading credential {}", settings.key_file.display()))?;
    let client = DropboxClient::new(&token, &settings.api_base)
        .context("building Dropbox client")?;

    run(&settings, previous.as_ref(), &client)
        .with_context(|| format!("processing {}", settings.walk_root().display()))?;
    Ok(())
}
