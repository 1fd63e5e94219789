//! lanzou-resolver CLI
//!
//! Run the HTTP endpoint, resolve a single share, or print the request
//! counters.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use lanzou_resolver::config::{ResolverConfig, ServerConfig, DEFAULT_ORIGIN, DEFAULT_PORT};
use lanzou_resolver::resolver::{parse_share_input, Resolver};
use lanzou_resolver::server::{self, AppState};
use lanzou_resolver::stats::{CounterSink, NoCounters, SqliteCounters, StatsDb};

#[derive(Parser)]
#[command(name = "lanzou-resolver")]
#[command(version)]
#[command(about = "Resolve Lanzou cloud share links into direct download URLs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG for finer control)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to a daily file in this directory instead of stderr
    #[arg(long, global = true, env = "LANZOU_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

/// How to reach the hosting service
#[derive(Args)]
struct ResolverArgs {
    /// Origin of the hosting service
    #[arg(long, env = "LANZOU_ORIGIN", default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "LANZOU_TIMEOUT_SECS", default_value = "10")]
    timeout: u64,

    /// Connect timeout in seconds
    #[arg(long, env = "LANZOU_CONNECT_TIMEOUT_SECS", default_value = "5")]
    connect_timeout: u64,
}

impl ResolverArgs {
    fn into_config(self) -> Result<ResolverConfig> {
        let config = ResolverConfig {
            origin: self.origin,
            request_timeout: Duration::from_secs(self.timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP endpoint
    Serve {
        #[command(flatten)]
        resolver: ResolverArgs,

        /// Address to bind
        #[arg(long, env = "LANZOU_BIND", default_value = "127.0.0.1")]
        bind: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Counters database (default: <data dir>/lanzou-resolver/stats.db)
        #[arg(long, env = "LANZOU_STATS_DB")]
        stats_db: Option<PathBuf>,

        /// Do not count requests
        #[arg(long)]
        no_stats: bool,
    },

    /// Resolve one share and print the direct link
    Resolve {
        /// Share identifier or share URL
        url: String,

        /// Share password
        #[arg(long)]
        pwd: Option<String>,

        #[command(flatten)]
        resolver: ResolverArgs,

        /// Skip the HEAD request for name and size
        #[arg(long)]
        no_probe: bool,
    },

    /// Show the request counters
    Stats {
        /// Counters database (default: <data dir>/lanzou-resolver/stats.db)
        #[arg(long, env = "LANZOU_STATS_DB")]
        stats_db: Option<PathBuf>,
    },
}

/// Install the global subscriber. The returned guard flushes the log file
/// and must live until exit.
fn init_logging(verbose: bool, log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let directive = if verbose {
        "lanzou_resolver=debug"
    } else {
        "lanzou_resolver=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "lanzou-resolver.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_ref())?;

    match cli.command {
        Commands::Serve {
            resolver,
            bind,
            port,
            stats_db,
            no_stats,
        } => {
            let resolver_config = resolver.into_config()?;
            let server_config = ServerConfig {
                bind,
                port,
                stats_db,
                counting: !no_stats,
            };
            server_config.validate()?;
            serve(resolver_config, server_config).await?;
        }

        Commands::Resolve {
            url,
            pwd,
            resolver,
            no_probe,
        } => {
            let identifier = parse_share_input(&url)?;
            let resolver = Resolver::new(&resolver.into_config()?)?;
            let link = resolver.resolve_link(&identifier, pwd.as_deref()).await?;

            println!("{}", link.url);
            if !no_probe {
                match resolver.probe(&link.url).await {
                    Ok(info) => {
                        println!("Name: {}", info.name);
                        println!("Size: {}", info.size);
                    }
                    Err(e) => warn!("Could not read file metadata: {}", e),
                }
            }
        }

        Commands::Stats { stats_db } => {
            let config = ServerConfig {
                stats_db,
                ..ServerConfig::default()
            };
            config.validate()?;
            let path = config
                .stats_db_path()
                .context("No counters database location")?;
            let db = StatsDb::open(&path)?;
            let snap = db.snapshot()?;

            println!("=== Request Counters ({}) ===", path.display());
            println!("Requests:      {}", snap.requests);
            println!("Success:       {}", snap.ok);
            println!("Invalid input: {}", snap.invalid_input);
            println!("All failed:    {}", snap.all_failed);
            match snap.updated_at {
                Some(at) => println!("Last update:   {}", at.to_rfc3339()),
                None => println!("Last update:   never"),
            }
            db.close()?;
        }
    }

    Ok(())
}

async fn serve(resolver_config: ResolverConfig, server_config: ServerConfig) -> Result<()> {
    let resolver = Resolver::new(&resolver_config)?;

    let db = if server_config.counting {
        let path = server_config
            .stats_db_path()
            .context("No counters database location")?;
        let db = Arc::new(StatsDb::open(&path)?);
        db.health_check()?;
        Some(db)
    } else {
        info!("Request counting disabled");
        None
    };

    let counters: Arc<dyn CounterSink> = match &db {
        Some(db) => Arc::new(SqliteCounters::new(Arc::clone(db))),
        None => Arc::new(NoCounters),
    };

    let listener = tokio::net::TcpListener::bind(server_config.addr())
        .await
        .with_context(|| format!("Failed to bind {}", server_config.addr()))?;

    let state = AppState { resolver, counters };
    server::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await?;

    if let Some(db) = db {
        // Pending counter writes hold clones until they finish
        let mut db = db;
        for _ in 0..50 {
            match Arc::try_unwrap(db) {
                Ok(inner) => return inner.close(),
                Err(shared) => {
                    db = shared;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            }
        }
        warn!("Counters database still in use at exit; skipping close");
    }

    Ok(())
}
