use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kuku")]
#[command(about = "Poultry advice relay for Kenyan farmers", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask one question through the live backend
    Ask {
        question: String,
        #[arg(short, long)]
        json: bool,
    },
    /// Print the prompt envelope without calling the backend
    Prompt { question: String },
    /// Print the effective configuration
    Config,
}
