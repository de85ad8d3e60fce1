use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use askai::assistant::{AssistantError, HttpAssistant};
use askai::auth::{StaticToken, StoredToken, TokenSource};
use askai::config::{Config, ConfigError, StoreKind};
use askai::error::ErrorCode;
use askai::session::{PersistStep, RejectReason, SendOutcome, SessionController, SessionError};
use askai::storage::{FileStorage, StorageError};
use askai::store::{ChatStore, LocalChatStore, RemoteChatStore, StoreError};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; pass --token, set ASKAI_ACCESS_TOKEN or run `askai login`")]
    NotLoggedIn,
    #[error("send rejected: {0}")]
    Rejected(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "askai", about = "Ask AI chat session CLI")]
struct Cli {
    /// Access token; overrides the token saved by `askai login`.
    #[arg(long, env = "ASKAI_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// `local` or `remote`.
    #[arg(long)]
    store: Option<StoreKind>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    api_base_url: Option<String>,

    #[arg(long)]
    assistant_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save an access token in the data directory.
    Login {
        access_token: String,
        #[arg(long)]
        refresh_token: Option<String>,
    },
    /// Forget the saved tokens. Local chats stay on disk.
    Logout,
    /// List chats, most recently created first.
    List,
    /// Create an empty chat.
    New,
    /// Print a chat with its messages.
    Show { chat_id: String },
    /// Send a message. Starts a new chat unless `--chat` is given.
    Send {
        #[arg(long = "chat")]
        chat_id: Option<String>,
        text: String,
    },
    Rename { chat_id: String, title: String },
    Delete { chat_id: String },
}

struct CliContext {
    config: Config,
    storage: Arc<FileStorage>,
    token: Option<String>,
}

impl CliContext {
    fn tokens(&self) -> Arc<dyn TokenSource> {
        match &self.token {
            Some(token) => Arc::new(StaticToken::new(Some(token.clone()))),
            None => Arc::new(StoredToken::new(self.storage.clone())),
        }
    }

    fn store(&self) -> Result<Arc<dyn ChatStore>, CliError> {
        let tokens = self.tokens();
        if tokens.token().is_none() {
            return Err(CliError::NotLoggedIn);
        }
        Ok(match self.config.store {
            StoreKind::Local => Arc::new(LocalChatStore::new(self.storage.clone(), tokens)),
            StoreKind::Remote => {
                Arc::new(RemoteChatStore::new(&self.config.api_base_url, tokens, self.config.timeouts)?)
            }
        })
    }

    fn controller(&self) -> Result<SessionController, CliError> {
        let assistant = HttpAssistant::new(self.config.assistant_url.as_str(), self.config.timeouts)?;
        Ok(SessionController::new(self.store()?, Arc::new(assistant))
            .with_reply_timeout(Duration::from_secs(self.config.timeouts.request_secs)))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = run(Cli::parse()).await {
        let code = error_code(&e);
        eprintln!("error [{code}]: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::from_env()?;
    if let Some(store) = cli.store {
        config.store = store;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url.trim_end_matches('/').to_owned();
    }
    if let Some(url) = cli.assistant_url {
        config.assistant_url = url.trim_end_matches('/').to_owned();
    }

    let storage = Arc::new(FileStorage::open(&config.data_dir)?);
    let ctx = CliContext { config, storage, token: cli.token };

    match cli.command {
        Command::Login { access_token, refresh_token } => {
            StoredToken::new(ctx.storage.clone()).login(&access_token, refresh_token.as_deref())?;
            print_json(&json!({ "logged_in": true }))
        }
        Command::Logout => {
            StoredToken::new(ctx.storage.clone()).logout()?;
            print_json(&json!({ "logged_in": false }))
        }
        Command::List => run_list(&ctx).await,
        Command::New => run_new(&ctx).await,
        Command::Show { chat_id } => run_show(&ctx, &chat_id).await,
        Command::Send { chat_id, text } => run_send(&ctx, chat_id.as_deref(), &text).await,
        Command::Rename { chat_id, title } => {
            let controller = ctx.controller()?;
            controller.rename(&chat_id, &title).await?;
            print_json(&json!({ "id": chat_id, "title": title }))
        }
        Command::Delete { chat_id } => {
            let controller = ctx.controller()?;
            controller.delete(&chat_id).await?;
            print_json(&json!({ "deleted": chat_id }))
        }
    }
}

async fn run_list(ctx: &CliContext) -> Result<(), CliError> {
    let chats = ctx.store()?.list().await?;
    print_json(&serde_json::to_value(chats)?)
}

async fn run_new(ctx: &CliContext) -> Result<(), CliError> {
    let controller = ctx.controller()?;
    let id = controller.new_chat().await?;
    let session = controller.snapshot();
    let title = session.active_chat().map(|c| c.title.as_str());
    print_json(&json!({ "id": id, "title": title }))
}

async fn run_show(ctx: &CliContext, chat_id: &str) -> Result<(), CliError> {
    let controller = ctx.controller()?;
    controller.load().await?;
    controller.select(chat_id).await?;
    let session = controller.snapshot();
    print_json(&json!({
        "chat": session.active_chat(),
        "messages": session.messages,
    }))
}

async fn run_send(ctx: &CliContext, chat_id: Option<&str>, text: &str) -> Result<(), CliError> {
    let controller = ctx.controller()?;
    if let Some(id) = chat_id {
        controller.load().await?;
        controller.select(id).await?;
    }

    let report = match controller.send(text).await? {
        SendOutcome::Completed(report) => report,
        SendOutcome::Rejected(reason) => return Err(CliError::Rejected(reject_label(reason))),
    };
    let session = controller.snapshot();
    let failures: Vec<Value> = report
        .persist_failures
        .iter()
        .map(|f| json!({ "step": step_label(f.step), "code": f.error.error_code(), "error": f.error.to_string() }))
        .collect();

    print_json(&json!({
        "chat_id": report.chat_id,
        "reply": session.messages.last().map(|m| m.content.as_str()),
        "fallback": report.fallback,
        "assistant_error": report.assistant_error.as_ref().map(ToString::to_string),
        "persist_failures": failures,
    }))
}

fn reject_label(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::Empty => "message is empty",
        RejectReason::Busy => "another message is being sent",
        RejectReason::Unauthenticated => "not logged in",
    }
}

fn step_label(step: PersistStep) -> &'static str {
    match step {
        PersistStep::UserMessage => "user_message",
        PersistStep::Title => "title",
        PersistStep::AssistantMessage => "assistant_message",
    }
}

fn error_code(err: &CliError) -> &'static str {
    match err {
        CliError::NotLoggedIn => "E_UNAUTHENTICATED",
        CliError::Rejected(_) => "E_REJECTED",
        CliError::Config(e) => e.error_code(),
        CliError::Storage(_) => "E_STORAGE",
        CliError::Store(e) => e.error_code(),
        CliError::Assistant(e) => e.error_code(),
        CliError::Session(e) => e.error_code(),
        CliError::InvalidJson(_) => "E_INVALID_JSON",
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
