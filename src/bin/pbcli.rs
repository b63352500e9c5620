//! pbcli
//!
//! Command-line client for the pub/sub service: server time, publish, subscribe with optional
//! auto heartbeat, history and a dump of the effective configuration.

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use pubsub_client::config::{ClientConfig, ConfigLoader};
use pubsub_client::logging::{init_logging, LoggingConfig};
use pubsub_client::{
    ConfigError, Context, ContextOptions, HeartbeatScheduler, PublishOptions, Reactor,
    TransactionResult,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pbcli", version, about = "Pub/sub client")]
struct Cli {
    /// Project directory to load `config/pubsub.toml` from
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Load this config file instead of the layered sources
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    origin: Option<String>,

    #[arg(long)]
    subscribe_key: Option<String>,

    #[arg(long)]
    publish_key: Option<String>,

    #[arg(long)]
    uuid: Option<String>,

    /// Enable logging
    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the server time
    Time,
    /// Publish a JSON message
    Publish {
        channel: String,
        message: String,
        #[arg(long)]
        no_store: bool,
        #[arg(long)]
        post: bool,
    },
    /// Subscribe and print incoming messages
    Subscribe {
        channel: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Stop after this many messages
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Send presence heartbeats every SECS seconds while subscribed
        #[arg(long, value_name = "SECS")]
        heartbeat: Option<u64>,
    },
    /// Print stored messages of a channel
    History {
        channel: String,
        #[arg(long, default_value_t = 100)]
        count: u32,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&build_logging_config(&cli, &config))) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("pbcli starting");
    match run(&cli, &config) {
        Ok(()) => info!("Command completed successfully"),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(&cli.project)?,
    };
    if let Some(origin) = &cli.origin {
        config.origin = origin.clone();
    }
    if let Some(key) = &cli.subscribe_key {
        config.keys.subscribe_key = key.clone();
    }
    if let Some(key) = &cli.publish_key {
        config.keys.publish_key = key.clone();
    }
    if let Some(uuid) = &cli.uuid {
        config.uuid = Some(uuid.clone());
    }
    Ok(config)
}

/// Logging is off unless `--verbose` is given; CLI flags override the config file
fn build_logging_config(cli: &Cli, config: &ClientConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();
    if !cli.verbose {
        logging.level = "off".to_string();
        return logging;
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    logging
}

fn run(cli: &Cli, config: &ClientConfig) -> Result<()> {
    match &cli.command {
        Commands::Config => {
            print!("{}", ConfigLoader::to_toml(config)?);
            Ok(())
        }
        command => run_transaction(command, config),
    }
}

fn run_transaction(command: &Commands, config: &ClientConfig) -> Result<()> {
    config.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
        ConfigError::Invalid(messages.join("\n"))
    })?;

    let ctx = config.build_context(ContextOptions::default());
    match command {
        Commands::Time => {
            expect_ok(ctx.time(), &ctx).context("time request failed")?;
            let token = ctx.get().ok_or_else(|| anyhow!("empty time response"))?;
            println!("{}  {}", token, format_timetoken(&token));
        }
        Commands::Publish {
            channel,
            message,
            no_store,
            post,
        } => {
            let options = PublishOptions {
                store: !no_store,
                via_post: *post,
                meta: None,
            };
            expect_ok(ctx.publish_with(channel, message, options), &ctx)
                .context("publish failed")?;
            let token = ctx.last_message_timetoken().unwrap_or_default();
            println!("published {}  {}", token, format_timetoken(&token));
        }
        Commands::Subscribe {
            channel,
            group,
            count,
            heartbeat,
        } => subscribe(
            &ctx,
            config,
            channel.as_deref(),
            group.as_deref(),
            *count,
            *heartbeat,
        )?,
        Commands::History { channel, count } => {
            expect_ok(ctx.history(channel, *count, true), &ctx).context("history failed")?;
            while let Some(message) = ctx.get() {
                println!("{}", message);
            }
        }
        Commands::Config => {}
    }
    ctx.free_with_timeout(Duration::from_secs(1))?;
    Ok(())
}

fn subscribe(
    ctx: &Context,
    config: &ClientConfig,
    channel: Option<&str>,
    group: Option<&str>,
    count: usize,
    heartbeat: Option<u64>,
) -> Result<()> {
    let scheduler = HeartbeatScheduler::new(config.heartbeat.scheduler.clone(), Reactor::new());
    let period = heartbeat.or(config.heartbeat.enabled.then_some(config.heartbeat.period_sec));
    if let Some(period) = period {
        ctx.enable_auto_heartbeat(&scheduler, period)?;
        info!(period_sec = period, "Auto heartbeat enabled");
    }

    let mut received = 0;
    while received < count {
        expect_ok(ctx.subscribe(channel, group), ctx).context("subscribe failed")?;
        while let Some(message) = ctx.get() {
            match ctx.get_channel() {
                Some(from) => println!("[{}] {}", from, message),
                None => println!("{}", message),
            }
            received += 1;
        }
    }

    scheduler.shutdown()?;
    Ok(())
}

fn expect_ok(result: TransactionResult, ctx: &Context) -> Result<()> {
    if result == TransactionResult::Ok {
        return Ok(());
    }
    match ctx.last_error_message() {
        Some(message) => bail!("{} (HTTP {}): {}", result, ctx.last_http_code(), message),
        None => bail!("{} (HTTP {})", result, ctx.last_http_code()),
    }
}

/// Timetokens count 100ns ticks since the Unix epoch
fn format_timetoken(token: &str) -> String {
    let Ok(ticks) = token.parse::<i64>() else {
        return String::new();
    };
    let secs = ticks / 10_000_000;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|time| time.to_rfc3339())
        .unwrap_or_default()
}
