//! Marquee movie catalog server.
//!
//! `marquee-server` (or `marquee-server serve`) runs the HTTP API,
//! `marquee-server migrate` applies the schema and exits, and
//! `marquee-server worker` consumes thumbnail jobs from Redis.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};

use marquee_server::{
    create_router, db,
    infra::{
        config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions},
        logging::init_tracing,
        startup,
    },
    worker::{RedisQueue, ThumbnailWorker},
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "marquee-server")]
#[command(about = "Movie catalog backend with chat and video uploads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    args: ConfigArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ConfigArgs {
    /// TOML configuration file (defaults to ./marquee.toml when present)
    #[arg(long, env = "MARQUEE_CONFIG_PATH", global = true)]
    config: Option<PathBuf>,

    /// Dotenv file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Consume thumbnail jobs from Redis until interrupted
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.args)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Migrate => run_migrate(config).await,
        Command::Worker => run_worker(config).await,
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    init_tracing(&config.storage.log_dir)?;

    if let Some(path) = config.metadata.env_file.as_ref() {
        info!("loaded {}", path.display());
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!("using config file {}", path.display());
    }
    for warning in warnings {
        warn!("{warning}");
    }

    Ok(config)
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_address();
    let runtime = startup::start(config).await?;
    let router = create_router(runtime.state.clone());

    info!("Starting Marquee server (HTTP) on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.shutdown();
    info!("server stopped");
    Ok(())
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.database)
        .await
        .context("failed to connect to PostgreSQL for migration")?;
    db::run_migrations(&pool)
        .await
        .context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    let redis = config
        .redis
        .as_ref()
        .context("the worker needs REDIS_HOST to reach the job queue")?;
    let queue = RedisQueue::connect(&redis.url)
        .await
        .context("failed to connect to Redis")?;

    let worker = ThumbnailWorker::new(config.worker.ffmpeg_path.clone(), config.storage.clone());
    worker.run_redis(queue, shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
