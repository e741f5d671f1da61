use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use memorial_core::{
    config::MemorialConfig,
    db::SqliteStore,
    service::PostService,
    store::{MemoryStore, ResourceStore},
    video::PreviewResolver,
};
use server::{
    board::spawn_board,
    routes::{router, AppState},
};
use tokio::{net::TcpListener, signal::ctrl_c};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    /// Path to config file; defaults to ~/.memorial/memorial.toml
    config: Option<PathBuf>,

    #[arg(short, long = "socket")]
    /// The socket address to serve on. For ex, 127.0.0.1:8080
    socket_addr: Option<SocketAddr>,

    #[arg(long, value_name = "PATH")]
    /// Sqlite database to keep posts in; posts live in memory without it
    db: Option<PathBuf>,

    #[arg(short, long)]
    /// Keep at most this many posts per collection; must be at least 1
    retention: Option<NonZeroUsize>,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}

fn open_store(config: &MemorialConfig) -> anyhow::Result<Box<dyn ResourceStore>> {
    match &config.db {
        Some(path) => {
            let store = SqliteStore::open(path, config.retention)
                .with_context(|| format!("Unable to open database {:?}", path))?;
            tracing::info!("Keeping posts in {:?}", path);
            Ok(Box::new(store))
        }
        None => {
            tracing::warn!("No database configured, posts are lost on restart");
            Ok(Box::new(MemoryStore::with_retention(config.retention)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MemorialConfig::load(cli.config.as_deref())?;
    if let Some(socket) = cli.socket_addr {
        config.socket = socket;
    }
    if let Some(db) = cli.db {
        config.db = Some(db);
    }
    if let Some(retention) = cli.retention {
        config.retention = Some(retention);
    }

    init_logging(&config.log_level);

    let admin = config.admin();
    if admin.is_none() {
        tracing::warn!("No admin credential set, posts can only be deleted by their creators");
    }

    let service = PostService::new(open_store(&config)?, admin);
    let (board, board_task) = spawn_board(service);
    let previews = PreviewResolver::new(config.preview_timeout(), config.public_host.clone())
        .context("Unable to build preview client")?;
    let app = router(AppState { board, previews });

    let listener = TcpListener::bind(config.socket)
        .await
        .with_context(|| format!("Unable to bind {}", config.socket))?;
    tracing::info!("Listening on {}", config.socket);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        })
        .await
        .context("Server error")?;

    // the router held the last board handles; the board drains and stops
    board_task.await.context("Board task panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_flag() {
        let cli = Cli::try_parse_from(["server", "--retention", "50"]).unwrap();
        assert_eq!(cli.retention, NonZeroUsize::new(50));

        assert!(Cli::try_parse_from(["server", "--retention", "0"]).is_err());
        assert!(Cli::try_parse_from(["server", "-r", "none"]).is_err());
    }
}
