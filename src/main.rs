//! Main entry point for the Draft Room service
//!
//! Loads configuration, restores saved state, serves the health endpoints,
//! and reads commands from stdin as `<player_id> <input>` lines until
//! interrupted.

use anyhow::Result;
use clap::Parser;
use draft_room::config::AppConfig;
use draft_room::gateway::Notice;
use draft_room::service::{AppState, HealthCheck};
use draft_room::types::{ChannelId, PlayerId};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

/// Draft Room - captain draft matchmaking for 5v5 and 2v2 matches
#[derive(Parser)]
#[command(
    name = "draft-room",
    version,
    about = "Matchmaking queues, captain drafts and map bans for team matches",
    long_about = "Draft Room runs 5v5 and 2v2 matchmaking queues. A full queue starts a match \
                 whose two captains draft players and ban maps in turn; results move ratings \
                 by fixed deltas. Commands are read from stdin as '<player_id> <input>' lines."
)]
struct Args {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "TOML configuration file; environment variables are used when omitted"
    )]
    config: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Log filter used when RUST_LOG is unset"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    #[arg(long, value_name = "FILE", help = "Override the state document path")]
    state_file: Option<PathBuf>,

    #[arg(long, help = "Do not serve the health and metrics endpoints")]
    no_health_server: bool,

    #[arg(short, long, help = "Shorthand for --log-level debug")]
    debug: bool,

    #[arg(
        long,
        help = "Print the resolved configuration and exit"
    )]
    dry_run: bool,
}

/// Logs go to stderr so stdout stays the console transcript
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("subscriber already installed: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT received");
        },
        _ = terminate => {
            info!("SIGTERM received");
        },
    }
}

fn print_notice(notice: &Notice) {
    println!("{}", notice.text);
    for choice in &notice.choices {
        println!("  [{}] {}", choice.token, choice.label);
    }
    println!();
}

/// Split a console line into actor and command input
fn split_line(line: &str) -> Option<(PlayerId, &str)> {
    let (actor, input) = line.trim().split_once(char::is_whitespace)?;
    Some((actor.parse().ok()?, input.trim()))
}

/// Feed stdin lines to the dispatcher until EOF
async fn run_console(app_state: &AppState, channel: ChannelId) {
    let dispatcher = app_state.dispatcher();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match split_line(&line) {
                Some((actor, input)) => {
                    let reply = dispatcher.handle(actor, channel, input).await;
                    print_notice(&reply);
                }
                None => println!("Expected '<player_id> <command>', e.g. '42 /play5'\n"),
            },
            Ok(None) => {
                info!("Console input closed");
                // Keep serving until a signal arrives
                std::future::pending::<()>().await;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

fn log_banner(config: &AppConfig) {
    info!("🚀 Draft Room Service");
    info!("   Name: {} ({})", config.service.name, config.service.log_level);
    if config.service.enable_health_server {
        info!("   Monitoring: http://0.0.0.0:{}", config.service.health_port);
    }
    info!("   State file: {}", config.storage.state_file.display());
    info!("   Administrators: {}", config.service.admin_ids.len());
    info!(
        "   Queues: 5v5 ({}), 2v2 ({})",
        config.queue.five_vs_five_capacity, config.queue.two_vs_two_capacity
    );
    info!(
        "   Maps: {} | Pick time: {}s",
        config.draft.maps.join(", "),
        config.draft.pick_timeout_seconds
    );
}

/// File or environment first, then command-line overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(path) = &args.config {
        AppConfig::from_file(path)?
    } else {
        AppConfig::from_env()?
    };

    if args.debug {
        config.service.log_level = "debug".into();
    } else if let Some(level) = &args.log_level {
        config.service.log_level = level.clone();
    }

    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }

    if let Some(path) = &args.state_file {
        config.storage.state_file = path.clone();
    }

    if args.no_health_server {
        config.service.enable_health_server = false;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("draft-room: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("draft-room: {:#}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        log_banner(&config);
        info!("Configuration is valid, not starting (--dry-run)");
        return Ok(());
    }

    log_banner(&config);

    let mut app_state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Could not wire the service");
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!(error = %e, "Could not start the service");
        std::process::exit(1);
    }

    info!("✅ Draft Room Service is running");
    info!("Type '<player_id> <command>' lines, Ctrl+C to shutdown");

    tokio::select! {
        _ = run_console(&app_state, config.service.default_channel) => {}
        _ = shutdown_signal() => {}
    }

    info!("🛑 Stopping, writing final snapshot");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    if let Ok(health) = HealthCheck::check(&app_state.matchmaker()).await {
        info!(
            "Final state: {} active matches, {} known players",
            health.stats.active_matches, health.stats.known_players
        );
    }
    info!("🛑 Draft Room Service stopped");
    Ok(())
}
