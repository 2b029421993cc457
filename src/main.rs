//! CLI entry point for gazette

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gazette")]
#[command(version)]
#[command(about = "A strict static site generator for Markdown blogs", long_about = None)]
struct Cli {
    /// Site root directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site into the output directory
    #[command(alias = "b")]
    Build,

    /// Build, then serve the site with live reload
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "gazette=debug,info"
    } else {
        "gazette=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Build => {
            let site = gazette::Site::new(&base_dir)?;
            site.build()?;
            println!("Build finished: {}", site.public_dir.display());
        }

        Commands::Serve { port, ip, open } => {
            let site = gazette::Site::new(&base_dir)?;
            site.build()?;
            gazette::server::start(&site, &ip, port, open).await?;
        }
    }

    Ok(())
}
