//! Handlers behind the CLI subcommands.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;

use super::{AskArgs, FilesArgs, NewArgs, SessionsArgs, SessionsCommands, SpeakArgs, StreamArgs, UploadArgs};
use crate::config::CodemindConfig;
use crate::dataset;
use crate::error::{CodemindError, Result};
use crate::gateway::SpeechSynthesizer;
use crate::orchestrator::{Orchestrator, TurnEvent, TurnEventPayload, TurnOutcome, TurnResult};
use crate::store::SessionStore;
use crate::tools::default_registry;
use crate::types::{AppMode, Message, MessageKind, Session};
use crate::workspace::{custom_session, Workspace};

/// Shared handles for one CLI invocation.
pub struct App {
    pub config: CodemindConfig,
    pub store: Arc<dyn SessionStore>,
}

impl App {
    pub fn new(config: CodemindConfig) -> Result<Self> {
        let store = config.session_store()?;
        Ok(Self { config, store })
    }

    fn workspace(&self) -> Result<Workspace> {
        let orchestrator = Orchestrator::builder()
            .gateway(Arc::new(self.config.gateway()?))
            .store(Arc::clone(&self.store))
            .tools(default_registry())
            .max_iterations(self.config.max_iterations)
            .exhaustion(self.config.on_exhaustion)
            .maybe_tool_timeout(self.config.tool_timeout())
            .build();
        Ok(Workspace::new(Arc::new(orchestrator), Arc::clone(&self.store))
            .with_event_sink(Arc::new(print_event)))
    }
}

fn print_event(event: TurnEvent) {
    match &event.payload {
        TurnEventPayload::AssistantDelta { text } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        TurnEventPayload::ToolExecutionStart { tool_name, args, .. } => {
            eprintln!("-> {tool_name} {args}");
        }
        TurnEventPayload::ToolExecutionEnd {
            tool_name, is_error, ..
        } => {
            let status = if *is_error { "failed" } else { "done" };
            eprintln!("<- {tool_name} {status}");
        }
        _ => {}
    }
}

async fn open_session(workspace: &Workspace, session: Option<&str>, mode: AppMode) -> Result<Session> {
    match session {
        Some(id) => {
            workspace.load_history().await;
            workspace.select_session(id)
        }
        None => Ok(workspace.create_session(mode).await),
    }
}

pub async fn handle_ask(app: &App, args: AskArgs) -> Result<()> {
    let workspace = app.workspace()?;
    let session = open_session(&workspace, args.session.as_deref(), AppMode::BusinessAgent).await?;
    let image = match &args.image {
        Some(path) => Some(image_data_url(path).await?),
        None => None,
    };

    let result = workspace.send_message(&args.prompt, image).await?;
    if let Some(answer) = result.session.last_answer() {
        println!("{}", answer.content);
        print_sources(answer);
    }
    report(&session, &result)
}

pub async fn handle_stream(app: &App, args: StreamArgs) -> Result<()> {
    let workspace = app.workspace()?;
    let session = open_session(&workspace, args.session.as_deref(), args.mode).await?;
    let image = match &args.image {
        Some(path) => Some(image_data_url(path).await?),
        None => None,
    };

    let result = workspace.stream_message(&args.prompt, image).await?;
    println!();
    if let Some(answer) = result.session.last_answer() {
        if result.outcome != TurnOutcome::Answered {
            println!("{}", answer.content);
        }
        print_sources(answer);
    }
    report(&session, &result)
}

fn report(session: &Session, result: &TurnResult) -> Result<()> {
    eprintln!("session {}", session.id);
    match &result.outcome {
        TurnOutcome::Failed { error } => Err(CodemindError::Stream(error.clone())),
        _ => Ok(()),
    }
}

fn print_sources(message: &Message) {
    for source in message.sources.iter().flatten() {
        eprintln!(
            "  [{:.2}] {} ({})",
            source.score, source.source.file_name, source.source.path
        );
    }
}

pub async fn handle_sessions(app: &App, args: SessionsArgs) -> Result<()> {
    match args.command {
        SessionsCommands::List => {
            let mut sessions: Vec<Session> = app.store.load_all().await?.into_values().collect();
            sessions.sort_by(|a, b| a.title.cmp(&b.title));
            for session in sessions {
                println!(
                    "{}  {:<24}  {} ({} messages)",
                    session.id,
                    session.mode,
                    session.title,
                    session.messages.len()
                );
            }
        }
        SessionsCommands::Show { id } => {
            let session = app
                .store
                .load(&id)
                .await?
                .ok_or_else(|| CodemindError::SessionNotFound(id.clone()))?;
            println!("# {} [{}]", session.title, session.mode);
            for message in &session.messages {
                print_message(message);
            }
        }
        SessionsCommands::Delete { id } => {
            if app.store.load(&id).await?.is_none() {
                return Err(CodemindError::SessionNotFound(id));
            }
            app.store.delete(&id).await?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn print_message(message: &Message) {
    match message.kind() {
        MessageKind::Text => println!("\n{}: {}", message.role, message.content),
        MessageKind::ToolRequest => {
            for call in message.tool_calls.iter().flatten() {
                println!("\n{} calls {}({})", message.role, call.name, serde_json::Value::Object(call.args.clone()));
            }
        }
        MessageKind::ToolResult => {
            for response in message.tool_responses.iter().flatten() {
                println!("\n{} {} -> {}", message.role, response.name, response.response);
            }
        }
        MessageKind::Placeholder => {}
    }
}

pub async fn handle_new(app: &App, args: NewArgs) -> Result<()> {
    let session = Session::new(args.mode);
    app.store.initialize().await?;
    app.store.save(&session).await?;
    println!("{}  {}", session.id, session.title);
    Ok(())
}

pub async fn handle_files(app: &App, args: FilesArgs) -> Result<()> {
    let (mode, custom) = match &args.session {
        Some(id) => {
            let session = app
                .store
                .load(id)
                .await?
                .ok_or_else(|| CodemindError::SessionNotFound(id.clone()))?;
            (session.mode, session.custom_dataset)
        }
        None => (args.mode, None),
    };

    let files = dataset::list_files(mode, custom.as_deref());
    match &args.show {
        Some(name) => {
            let source = files
                .iter()
                .find(|s| s.file_name == *name)
                .ok_or_else(|| CodemindError::InvalidArgument(format!("no file named {name:?} in {mode}")))?;
            let content = dataset::file_content(source, mode, custom.as_deref())
                .unwrap_or_else(|| "Could not load file content.".to_string());
            println!("{content}");
        }
        None => {
            for source in files {
                println!("{}  ({})", source.file_name, source.path);
            }
        }
    }
    Ok(())
}

pub async fn handle_upload(app: &App, args: UploadArgs) -> Result<()> {
    let session = custom_session(&args.paths).await?;
    app.store.initialize().await?;
    app.store.save(&session).await?;
    println!("{}  {}", session.id, session.title);
    Ok(())
}

pub async fn handle_speak(app: &App, args: SpeakArgs) -> Result<()> {
    let audio = app.config.speech()?.synthesize(&args.text).await?;
    tokio::fs::write(&args.out, &audio).await?;
    println!("wrote {} bytes to {}", audio.len(), args.out.display());
    Ok(())
}

/// Read an image file into a `data:` URL.
async fn image_data_url(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => {
            return Err(CodemindError::InvalidArgument(format!(
                "unsupported image type: {}",
                path.display()
            )))
        }
    };
    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{data}"))
}
