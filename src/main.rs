use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use turnloop::agent::builtin::builtin_agents;
use turnloop::agent::submission::HELP_TEXT;
use turnloop::agent::{Submission, SubmissionParser, TurnRequest, TurnRunner};
use turnloop::config::AppConfig;
use turnloop::content::{Chunk, TurnEvent};
use turnloop::llm::{create_search_provider, language_models};
use turnloop::store::{Chat, ChatStore, LibSqlChatStore};
use turnloop::tools::ToolRegistry;
use turnloop::tools::builtin::{SoftwareExpertTool, WebSearchTool};

const CHATS_PAGE_SIZE: u32 = 10;

/// Stderr logging plus an optional daily log file. The guard must outlive
/// the program for the file writer to flush.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "turnloop.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TURNLOOP_API_KEY=sk-...");
        std::process::exit(1);
    });
    let _log_guard = init_tracing(&config);

    let models = language_models(&config.models);
    let search = config.search.as_ref().map(create_search_provider);

    let tools = Arc::new(ToolRegistry::new());
    tools.register_sync(Arc::new(WebSearchTool::new(search)));
    tools.register_sync(Arc::new(SoftwareExpertTool));

    let store: Arc<dyn ChatStore> = Arc::new(
        LibSqlChatStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    let runner = TurnRunner::new(
        Arc::new(builtin_agents()),
        tools,
        models,
        config.default_agent.clone(),
    )
    .with_max_tokens(config.models.max_tokens)
    .with_store(Arc::clone(&store));

    eprintln!("🤖 Turnloop v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.models.core_model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Web search: {}",
        if config.search.is_some() { "enabled" } else { "disabled" }
    );
    eprintln!("   Type a message and press Enter. /help for commands.\n");

    let mut chat = Chat::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match SubmissionParser::parse(&line) {
            Submission::UserInput { content } => run_turn(&runner, &mut chat, content).await,
            Submission::Agents => {
                for agent in runner.agents().named_agents(runner.tools()).await {
                    eprintln!("  @{:<12} {}", agent.name(), agent.description());
                }
            }
            Submission::Tools => {
                for tool in runner.tools().all().await {
                    let state = if tool.is_available() { "" } else { " (unavailable)" };
                    eprintln!(
                        "  {:<16} [{}] {}{}",
                        tool.name(),
                        tool.icon(),
                        tool.description(),
                        state
                    );
                }
            }
            Submission::NewChat => {
                chat = Chat::new();
                eprintln!("Started a new chat");
            }
            Submission::ListChats { page } => list_chats(store.as_ref(), page).await,
            Submission::OpenChat { chat_id } => match store.get_chat(chat_id).await {
                Ok(Some(found)) => {
                    eprintln!("Opened chat {} ({} messages)", found.id, found.turns.len());
                    chat = found;
                }
                Ok(None) => eprintln!("No chat with id {chat_id}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            Submission::RenameChat { title } => {
                match store.rename_chat(chat.id, &title).await {
                    Ok(()) => eprintln!("Renamed chat to {title:?}"),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Submission::DeleteChat { chat_id } => match store.delete_chat(chat_id).await {
                Ok(true) => {
                    eprintln!("Deleted chat {chat_id}");
                    if chat.id == chat_id {
                        chat = Chat::new();
                    }
                }
                Ok(false) => eprintln!("No chat with id {chat_id}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            Submission::Help => eprintln!("{HELP_TEXT}"),
            Submission::Quit => break,
        }
    }

    eprintln!("Goodbye!");
    Ok(())
}

/// Stream one turn to the terminal. Ctrl+C cancels it.
async fn run_turn(runner: &TurnRunner, chat: &mut Chat, input: String) {
    let request = TurnRequest::new(input).with_history(chat.history());
    let mut turn = match runner.start(request) {
        Ok(turn) => turn,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            event = turn.next_event() => match event {
                Some(event) => render(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                turn.cancel();
                eprintln!("\n⏹  Cancelled");
                break;
            }
        }
    }

    let outcome = turn.finish().await;
    println!();
    if let Err(e) = runner.record(chat, &outcome).await {
        tracing::warn!(error = %e, "Failed to save chat");
    }
}

fn render(event: TurnEvent) {
    match event {
        TurnEvent::ChunkAppended { chunk, .. } => match chunk {
            Chunk::Text { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            Chunk::ToolCall { name, .. } => eprintln!("\n🔧 Running {name}..."),
        },
        TurnEvent::ErrorRecorded { message } => eprintln!("\n❌ {message}"),
        TurnEvent::Status { message } => eprintln!("⏳ {message}"),
        TurnEvent::CallStarted { .. }
        | TurnEvent::CallFinished { .. }
        | TurnEvent::Observed { .. } => {}
    }
}

async fn list_chats(store: &dyn ChatStore, page: u32) {
    let chats = match store.list_chats(page, CHATS_PAGE_SIZE).await {
        Ok(chats) => chats,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };
    let total = store.total_chats().await.unwrap_or(0);
    if chats.is_empty() {
        eprintln!("No chats on page {page} ({total} total)");
        return;
    }
    for meta in chats {
        eprintln!(
            "  {}  {}  {}",
            meta.id,
            meta.updated_at.format("%Y-%m-%d %H:%M"),
            meta.title
        );
    }
    eprintln!("Page {page} of {}", total.div_ceil(u64::from(CHATS_PAGE_SIZE)).max(1));
}
