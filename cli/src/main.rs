//! artisync CLI - build a project tree from a language server and follow it.
//!
//! ```text
//! main() -> load config -> LanguageClient::start -> SyncSession::open_workspace
//!                                                        |
//!                                                        v
//!                                     print tree JSON, then (--watch) one JSON
//!                                     line per ArtifactsUpdated event
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use artisync_lsp::{CapabilityNegotiator, LanguageClient};
use artisync_sync::{SyncConfig, SyncSession};
use artisync_types::ProjectInfo;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build a project tree from a language server and print it as JSON.
#[derive(Debug, Parser)]
#[command(name = "artisync")]
#[command(about = "Print and follow a project's artifact tree from a language server")]
struct Args {
    /// Sync configuration (default: ~/.artisync/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Treat the project directory as a workspace with this member package
    #[arg(long = "member")]
    members: Vec<PathBuf>,
    /// Print the extended operations the server supports
    #[arg(long)]
    capabilities: bool,
    /// Keep running and print every artifact update
    #[arg(long)]
    watch: bool,
    /// Project directory
    project: PathBuf,
}

fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    match path {
        Some(path) => Ok(SyncConfig::load(path)?),
        None => Ok(SyncConfig::load_default()?.unwrap_or_default()),
    }
}

fn package_info(path: &Path) -> ProjectInfo {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ProjectInfo::package(name, path)
}

fn project_info(args: &Args) -> Result<ProjectInfo> {
    let root = std::fs::canonicalize(&args.project)
        .with_context(|| format!("resolving {}", args.project.display()))?;
    let mut info = package_info(&root);
    for member in &args.members {
        let member = root.join(member);
        let member = std::fs::canonicalize(&member)
            .with_context(|| format!("resolving member {}", member.display()))?;
        info.children.push(package_info(&member));
    }
    Ok(info)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let server = config
        .server
        .clone()
        .context("no [server] section in the configuration")?;
    let info = project_info(&args)?;

    let (client, events) = LanguageClient::start(&server, &info.project_path)
        .await
        .context("starting language server")?;
    let client = Arc::new(client);

    if args.capabilities {
        let negotiator = CapabilityNegotiator::new(Arc::clone(&client));
        let supported: Vec<&str> = negotiator.negotiate().await.iter().collect();
        if negotiator.is_optimistic() {
            tracing::info!("server does not negotiate extended services; assuming all");
        }
        print_json(&supported)?;
    }

    let mut session = SyncSession::new(Arc::clone(&client), &config);
    session.attach(events);

    let tree = session
        .open_workspace(&info)
        .await
        .context("building project structure")?;
    print_json(tree)?;

    if args.watch {
        let mut updates = session.subscribe();
        loop {
            tokio::select! {
                alive = session.process_next() => {
                    while let Ok(update) = updates.try_recv() {
                        print_json(&update)?;
                    }
                    if !alive {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        if let Some(reason) = session.server_stopped() {
            tracing::info!(?reason, "stopped watching");
        }
    }

    drop(session);
    match Arc::try_unwrap(client) {
        Ok(client) => client.shutdown().await,
        Err(_) => tracing::warn!("language client still shared at exit; dropping it"),
    }

    Ok(())
}
