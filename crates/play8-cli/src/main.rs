//! Terminal client for the play8 training coach.

mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use play8_core::models::StudioCatalog;
use play8_core::services::GeneratedCardProgress;
use play8_core::{
    AgentRepository, AuthService, ChatController, ClientConfig, ClientConfigRepository,
    HttpAgentRepository, PlanController, SessionAuth, SwitchOutcome, TurnOutcome,
};
use tracing::{debug, info};

use crate::repl::TerminalNavigator;

#[derive(Debug, Parser)]
#[command(name = "play8", version, about = "Chat with the play8 tennis coach")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8001/api/v1
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Session cookie sent with every request (`name=value`)
    #[arg(long, global = true)]
    cookie: Option<String>,

    /// Read and write settings at this path instead of the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat interactively, or send a single message and exit
    Chat {
        /// Resume this conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Send this message and exit instead of starting a session
        message: Option<String>,
    },
    /// List saved conversations
    Conversations,
    /// Show the training plan board
    Plan,
    /// Browse the built-in card catalog, or match it against some text
    Studio { text: Vec<String> },
    /// Store the effective base URL and cookie in the settings file
    Configure,
}

/// Everything a command needs, wired to the HTTP backend.
pub(crate) struct App {
    pub chat: ChatController,
    pub plan: PlanController,
    pub auth: Arc<SessionAuth>,
    pub studio: StudioCatalog,
}

impl App {
    fn connect(config: ClientConfig) -> Result<Self> {
        let repository: Arc<dyn AgentRepository> = Arc::new(
            HttpAgentRepository::new(config.clone()).context("Failed to build HTTP client")?,
        );
        let auth = Arc::new(SessionAuth::from_config(&config));
        let chat = ChatController::new(
            repository.clone(),
            auth.clone(),
            Arc::new(TerminalNavigator),
            Arc::new(GeneratedCardProgress::new(repository.clone())),
        );
        let plan = PlanController::new(repository, auth.clone());
        let studio = StudioCatalog::builtin().context("Built-in card catalog is malformed")?;
        Ok(Self {
            chat,
            plan,
            auth,
            studio,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with streamed replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => ClientConfigRepository::with_path(path.clone()),
        None => ClientConfigRepository::new()?,
    };
    let mut config = settings
        .load()
        .await
        .with_context(|| format!("Failed to read {}", settings.path().display()))?
        .apply_env();
    if let Some(url) = cli.base_url {
        config = config.with_base_url(url);
    }
    if let Some(cookie) = cli.cookie {
        config.session_cookie = Some(cookie);
        config = config.normalized();
    }
    debug!(base_url = %config.api_base_url, "Effective configuration");

    match cli.command.unwrap_or(Command::Chat {
        conversation: None,
        message: None,
    }) {
        Command::Configure => {
            settings.save(config).await?;
            println!("Saved settings to {}", settings.path().display());
        }
        Command::Studio { text } => {
            let studio = StudioCatalog::builtin()?;
            if text.is_empty() {
                render::print_catalog(&studio);
            } else {
                render::print_suggestions(&studio.contextual_matches(&text.join(" ")));
            }
        }
        Command::Conversations => {
            let app = App::connect(config)?;
            require_sign_in(&app)?;
            app.chat.load_conversations().await;
            render::print_conversations(&app.chat.conversations());
        }
        Command::Plan => {
            let app = App::connect(config)?;
            require_sign_in(&app)?;
            if !app.plan.load().await {
                anyhow::bail!("Could not load the training plan");
            }
            render::print_board(&app.plan.board());
        }
        Command::Chat {
            conversation,
            message,
        } => {
            let app = App::connect(config)?;
            if let Some(id) = &conversation {
                let outcome = app.chat.switch_conversation(id).await;
                if outcome == SwitchOutcome::Missing {
                    anyhow::bail!("Conversation {id} could not be loaded");
                }
            }
            match message {
                Some(text) => {
                    let outcome = repl::send_and_print(&app, &text).await?;
                    if outcome == TurnOutcome::LoginRequired {
                        anyhow::bail!(
                            "Sign in at {} and pass the session cookie",
                            app.auth.login_url()
                        );
                    }
                }
                None => {
                    info!("Starting interactive session");
                    repl::run(&app).await?;
                }
            }
        }
    }

    Ok(())
}

fn require_sign_in(app: &App) -> Result<()> {
    if app.auth.is_authenticated() {
        Ok(())
    } else {
        anyhow::bail!(
            "Not signed in. Sign in at {} and pass the session cookie with --cookie",
            app.auth.login_url()
        )
    }
}
