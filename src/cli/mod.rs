//! CLI entry point for codemind.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::types::AppMode;

/// codemind: chat with a business analyst agent over your data
#[derive(Parser, Debug)]
#[command(name = "codemind", version, about = "Agentic chat over support tickets, sales data and documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the agent a question (tool-using turn)
    Ask(AskArgs),
    /// Ask a retrieval mode and stream the answer
    Stream(StreamArgs),
    /// Inspect and manage saved sessions
    Sessions(SessionsArgs),
    /// Start a new session
    New(NewArgs),
    /// List the files available in a mode
    Files(FilesArgs),
    /// Open a `Your Documents` session over local files
    Upload(UploadArgs),
    /// Read text aloud into an audio file
    Speak(SpeakArgs),
}

/// Arguments for `codemind ask`.
#[derive(Parser, Debug)]
pub struct AskArgs {
    /// The question
    pub prompt: String,

    /// Continue an existing session instead of starting a new one
    #[arg(short, long)]
    pub session: Option<String>,

    /// Attach an image file
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

/// Arguments for `codemind stream`.
#[derive(Parser, Debug)]
pub struct StreamArgs {
    /// The question
    pub prompt: String,

    /// Mode for a new session (codebase, research, support, web, drive, custom)
    #[arg(short, long, default_value = "support")]
    pub mode: AppMode,

    /// Continue an existing session instead of starting a new one
    #[arg(short, long)]
    pub session: Option<String>,

    /// Attach an image file
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

/// Arguments for the `sessions` subcommand group.
#[derive(Parser, Debug)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommands {
    /// List sessions by title
    List,
    /// Print a session's transcript
    Show { id: String },
    /// Delete a session
    Delete { id: String },
}

/// Arguments for `codemind new`.
#[derive(Parser, Debug)]
pub struct NewArgs {
    #[arg(short, long, default_value = "agent")]
    pub mode: AppMode,
}

/// Arguments for `codemind files`.
#[derive(Parser, Debug)]
pub struct FilesArgs {
    #[arg(short, long, default_value = "support")]
    pub mode: AppMode,

    /// Use a session's custom dataset
    #[arg(short, long)]
    pub session: Option<String>,

    /// Print the content of the file with this name
    #[arg(long)]
    pub show: Option<String>,
}

/// Arguments for `codemind upload`.
#[derive(Parser, Debug)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Arguments for `codemind speak`.
#[derive(Parser, Debug)]
pub struct SpeakArgs {
    pub text: String,

    /// Where to write the raw audio (16-bit PCM, 24 kHz mono)
    #[arg(short, long, default_value = "speech.pcm")]
    pub out: PathBuf,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
