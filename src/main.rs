//! codemind CLI binary entry point.

use codemind::cli::commands::{self, App};
use codemind::cli::{Cli, Commands};
use codemind::config::CodemindConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "codemind=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match CodemindConfig::load().and_then(App::new) {
        Ok(app) => match cli.command {
            Commands::Ask(args) => commands::handle_ask(&app, args).await,
            Commands::Stream(args) => commands::handle_stream(&app, args).await,
            Commands::Sessions(args) => commands::handle_sessions(&app, args).await,
            Commands::New(args) => commands::handle_new(&app, args).await,
            Commands::Files(args) => commands::handle_files(&app, args).await,
            Commands::Upload(args) => commands::handle_upload(&app, args).await,
            Commands::Speak(args) => commands::handle_speak(&app, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
