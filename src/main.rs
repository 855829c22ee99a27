use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use projectdesk::client::{LocalApi, ProjectApi, RestClient};
use projectdesk::config::{ServerConfig, SyncConfig};
use projectdesk::models::{LogEntry, Message, MessageMetadata};
use projectdesk::notify::NotificationBus;
use projectdesk::sync::{NoticeLevel, ProjectSync};
use projectdesk::{api, mcp};

#[derive(Parser)]
#[command(name = "pdesk")]
#[command(about = "Project dashboard backend with live conversations and assistant follow-ups")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and notification server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for HTTP API
        #[arg(short, long, default_value = "3000", env = "PROJECTDESK_PORT")]
        port: u16,

        /// SQLite database file (defaults to the platform data directory)
        #[arg(long, env = "PROJECTDESK_DB")]
        db: Option<PathBuf>,
    },
    /// Start MCP server via stdio for an assistant agent
    Mcp {
        /// SQLite database file, used when no server is given
        #[arg(long, env = "PROJECTDESK_DB")]
        db: Option<PathBuf>,

        /// Talk to a running server instead of opening the database
        #[arg(long, env = "PROJECTDESK_SERVER")]
        server: Option<String>,
    },
    /// Follow a project's conversation and send automatic follow-ups
    Watch {
        /// Server base URL
        #[arg(long, env = "PROJECTDESK_SERVER", default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Project to observe
        #[arg(long)]
        project: i64,
    },
}

fn init_tracing(stderr_only: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "projectdesk=debug,tower_http=debug".into()),
    );

    // stdout belongs to the MCP transport.
    if stderr_only {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Some(Commands::Mcp { .. })));

    match cli.command {
        Some(Commands::Serve { host, port, db }) => {
            serve(ServerConfig {
                host,
                port,
                database: db,
            })
            .await?;
        }
        Some(Commands::Mcp { db, server }) => {
            let api: Arc<dyn ProjectApi> = match server {
                Some(url) => {
                    tracing::info!(server = %url, "MCP server using remote API");
                    Arc::new(RestClient::from_url(&url)?)
                }
                None => {
                    let config = ServerConfig {
                        database: db,
                        ..Default::default()
                    };
                    Arc::new(LocalApi::new(config.open_database()?, NotificationBus::new()))
                }
            };

            mcp::run_stdio_server(api).await?;
        }
        Some(Commands::Watch { server, project }) => {
            watch(&server, project).await?;
        }
        None => {
            // Default: start server
            serve(ServerConfig::default()).await?;
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!("Starting ProjectDesk server on {}:{}", config.host, config.port);

    let db = config.open_database()?;
    let state = api::AppState::new(db, NotificationBus::new());
    let app = api::create_router(state);

    let listener = config.bind().await?;
    tracing::info!("ProjectDesk server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal())
        .await?;

    Ok(())
}

async fn watch(server: &str, project_id: i64) -> anyhow::Result<()> {
    let client = RestClient::from_url(server)?;
    let bus = NotificationBus::new();
    let _feed = client.forward_events(bus.clone(), Some(project_id))?;

    let sync = ProjectSync::new(Arc::new(client), bus, SyncConfig::default());
    let mut views = sync.watch();
    let mut notices = sync.notices();

    let view = sync.observe(Some(project_id)).await?;
    println!("Watching project {} ({} messages)", project_id, view.messages.len());

    let mut printed = HashSet::new();
    let mut printed_logs = HashSet::new();
    print_new_messages(&view.messages, &mut printed);
    print_new_logs(&view.logs, &mut printed_logs);
    let mut status = view.active_task_message;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print_new_messages(&view.messages, &mut printed);
                print_new_logs(&view.logs, &mut printed_logs);
                if view.active_task_message != status {
                    status = view.active_task_message;
                    if let Some(text) = &status {
                        println!("  [status] {}", text);
                    }
                }
            }
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    if notice.level == NoticeLevel::Error {
                        eprintln!("error: {}", notice.message);
                    }
                }
            }
            _ = api::shutdown_signal() => break,
        }
    }

    Ok(())
}

fn print_new_messages(messages: &[Message], printed: &mut HashSet<i64>) {
    for message in messages {
        if !printed.insert(message.id) {
            continue;
        }
        let time = message.created_at.format("%Y-%m-%d %H:%M");
        println!("[{}] {}: {}", time, message.sender.as_str(), message.content);
        if let Some(MessageMetadata::CodeBlock { language, filename, code }) = &message.metadata {
            println!("  ```{} {}", language, filename.as_deref().unwrap_or(""));
            for line in code.lines() {
                println!("  {}", line);
            }
            println!("  ```");
        }
    }
}

fn print_new_logs(logs: &[LogEntry], printed: &mut HashSet<i64>) {
    for log in logs {
        if printed.insert(log.id) {
            println!("  [{}] {}", log.log_type, log.title);
        }
    }
}
