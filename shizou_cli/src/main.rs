use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::generate;
use colored::Colorize;
use shizou_cli::config::{AppConfig, ConfigManager};
use shizou_cli::output::{self, OutputFormat};
use shizou_cli::terminal;
use shizou_core::protocol::http::HttpSession;
use shizou_core::protocol::image::ImageClient;
use shizou_core::protocol::udp::{MyListState, UdpSession, UdpSocketTransport};
use shizou_core::{
    BanGate, CommandArgs, CommandContext, CommandProcessor, CommandService, Database, Priority,
    QueueType, RateLimitConfig, RateLimiter,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "shizou")]
#[command(author, version, about = "Shizou - AniDB command queue for a personal media library", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every queue processor until interrupted
    Run {
        /// Start with all processors paused
        #[arg(long)]
        start_paused: bool,
    },

    /// Queue a command
    Dispatch {
        /// Queue priority (urgent, high, normal, low)
        #[arg(short, long)]
        priority: Option<Priority>,

        #[command(subcommand)]
        command: CommandTarget,
    },

    /// Queue a command at a later time, optionally recurring
    Schedule {
        /// Seconds until the first run
        #[arg(long = "in", value_name = "SECS", default_value_t = 0)]
        delay: u64,

        /// Seconds between runs
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,

        /// Number of runs; defaults to 1, or unlimited with --every
        #[arg(long)]
        runs: Option<u32>,

        #[command(subcommand)]
        command: CommandTarget,
    },

    /// Inspect or clear queues
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Pending counts, scheduled commands and active bans
    Status {
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum CommandTarget {
    /// Command that does nothing
    Noop { id: u64 },

    /// Look a file up by id or by size and ED2K hash
    Process {
        #[arg(long, required_unless_present = "ed2k", conflicts_with_all = ["size", "ed2k"])]
        fid: Option<u64>,

        #[arg(long, requires = "ed2k")]
        size: Option<u64>,

        #[arg(long, requires = "size")]
        ed2k: Option<String>,
    },

    /// Fetch and cache an anime document
    Anime { aid: u64 },

    /// Add a file to mylist
    MylistAdd {
        fid: u64,

        #[arg(long)]
        watched: Option<bool>,

        /// unknown, internal, external, deleted or remote
        #[arg(long)]
        state: Option<MyListState>,
    },

    /// Edit a mylist entry
    MylistUpdate {
        lid: u64,

        #[arg(long)]
        watched: Option<bool>,

        #[arg(long)]
        state: Option<MyListState>,
    },

    /// Download an image
    Image { url: String, path: PathBuf },

    /// Hash a local file and look it up
    Hash { path: PathBuf },
}

impl CommandTarget {
    fn into_args(self) -> Result<CommandArgs> {
        Ok(match self {
            Self::Noop { id } => CommandArgs::Noop { id },
            Self::Process {
                fid: Some(fid), ..
            } => CommandArgs::process_fid(fid),
            Self::Process {
                size: Some(size),
                ed2k: Some(ed2k),
                ..
            } => CommandArgs::process_hash(size, &ed2k),
            Self::Process { .. } => anyhow::bail!("Either --fid or --size with --ed2k is required"),
            Self::Anime { aid } => CommandArgs::Anime { aid },
            Self::MylistAdd {
                fid,
                watched,
                state,
            } => CommandArgs::AddMyList {
                fid,
                watched,
                state,
            },
            Self::MylistUpdate {
                lid,
                watched,
                state,
            } => CommandArgs::update_mylist(lid, watched, None, state),
            Self::Image { url, path } => CommandArgs::GetImage {
                url,
                save_path: path,
            },
            Self::Hash { path } => CommandArgs::Hash {
                path: path
                    .canonicalize()
                    .with_context(|| format!("Cannot read {}", path.display()))?,
            },
        })
    }
}

#[derive(Subcommand)]
enum QueueCommand {
    /// List pending commands
    List {
        /// Only this queue
        #[arg(short, long)]
        queue: Option<QueueType>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove every pending command of a queue
    Clear { queue: QueueType },

    /// Pending count per queue
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., anidb.username)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., processor.poll_interval_ms)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Warn)
            .filter_module("shizou_core", log::LevelFilter::Debug)
            .filter_module("shizou_cli", log::LevelFilter::Debug)
            .filter_module("shizou", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .init();
    }
    terminal::configure_colors();

    let manager = ConfigManager::new();

    match cli.command {
        Commands::Run { start_paused } => {
            run_command(manager.load()?, start_paused).await?;
        }
        Commands::Dispatch { priority, command } => {
            let service = open_service(&manager.load()?).await?;
            let args = command.into_args()?;
            let inserted = match priority {
                Some(priority) => service.dispatch_with_priority(&args, priority).await?,
                None => service.dispatch(&args).await?,
            };
            if inserted {
                println!("Queued {} on {}", args.command_id(), args.queue_type());
            } else {
                println!("{} is already queued", args.command_id());
            }
        }
        Commands::Schedule {
            delay,
            every,
            runs,
            command,
        } => {
            let service = open_service(&manager.load()?).await?;
            let args = command.into_args()?;
            let first_run = Utc::now()
                + chrono::Duration::from_std(Duration::from_secs(delay))
                    .context("Delay is too large")?;
            let runs = match (runs, every) {
                (Some(runs), _) => Some(runs),
                (None, Some(_)) => None,
                (None, None) => Some(1),
            };
            let id = service
                .schedule_command(&args, runs, first_run, every.map(Duration::from_secs))
                .await?;
            println!(
                "Scheduled {} (#{id}) first at {}",
                args.command_id(),
                first_run.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Commands::Queue { command } => {
            let service = open_service(&manager.load()?).await?;
            queue_command(&service, command).await?;
        }
        Commands::Status { format } => {
            let service = open_service(&manager.load()?).await?;
            let stats = service.stats().await?;
            let scheduled = service.scheduled().await?;
            let timers = service.database().timers().list().await?;
            println!(
                "{}",
                output::format_status(&stats, &scheduled, &timers, Utc::now(), format)?
            );
        }
        Commands::Config { command } => {
            config_command(&manager, command)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn open_service(config: &AppConfig) -> Result<CommandService> {
    let path = &config.storage.database_path;
    log::debug!("Opening database at {}", path.display());
    let db = Database::new(path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(CommandService::new(db))
}

async fn queue_command(service: &CommandService, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::List { queue, format } => {
            let requests = service.pending(queue).await?;
            println!("{}", output::format_requests(&requests, format)?);
        }
        QueueCommand::Clear { queue } => {
            let removed = service
                .database()
                .command_requests()
                .clear_queue(queue)
                .await?;
            println!("Removed {removed} command(s) from {queue}");
        }
        QueueCommand::Stats => {
            println!("{}", output::format_stats(&service.stats().await?));
        }
    }
    Ok(())
}

fn config_command(manager: &ConfigManager, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get { key } => println!("{}", manager.get(&key)?),
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value)?;
            println!("{} {key} = {value}", "✓".green());
        }
        ConfigCommand::List => {
            for (key, value) in manager.list()? {
                // Never echo the password
                let value = if key == "anidb.password" && !value.is_empty() {
                    "********".to_string()
                } else {
                    value
                };
                println!("{key} = {value}");
            }
        }
        ConfigCommand::Path => println!("{}", manager.path().display()),
    }
    Ok(())
}

/// Build the clients and one processor per queue, then run until Ctrl-C
async fn run_command(config: AppConfig, start_paused: bool) -> Result<()> {
    let service = open_service(&config).await?;
    let ban_period = config.ban_period();
    let udp_ban = BanGate::new("udp", ban_period);
    let http_ban = BanGate::new("http", ban_period);

    let udp_config = config.udp_config();
    if let Err(e) = udp_config.validate() {
        log::warn!("AniDB commands will pause until credentials are configured: {e}");
    }
    let transport = Arc::new(UdpSocketTransport::new(
        udp_config.host.clone(),
        udp_config.port,
        udp_config.local_port,
    ));
    let udp = UdpSession::new(
        udp_config,
        transport,
        RateLimiter::new("udp", RateLimitConfig::udp()),
        udp_ban.clone(),
    );
    let http = HttpSession::new(
        config.http_config(),
        RateLimiter::new("http", RateLimitConfig::http()),
        http_ban.clone(),
    )
    .context("Failed to build HTTP client")?;
    let image = ImageClient::new(
        config.image_config(),
        RateLimiter::new("image", RateLimitConfig::image()),
    )
    .context("Failed to build image client")?;

    let context = Arc::new(
        CommandContext::new(service.clone(), config.command_settings())
            .with_udp(Arc::new(udp))
            .with_http(Arc::new(http))
            .with_image(Arc::new(image)),
    );
    let processor_config = config.processor_config(start_paused);

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();
    for queue in QueueType::ALL {
        let ban = match queue {
            QueueType::AniDbUdp => udp_ban.clone(),
            QueueType::AniDbHttp => http_ban.clone(),
            other => BanGate::new(other.as_str(), ban_period),
        };
        let processor = Arc::new(CommandProcessor::new(
            queue,
            processor_config,
            service.clone(),
            context.clone(),
            ban,
        ));

        let mut updates = processor.subscribe();
        let token = shutdown.clone();
        tasks.spawn(async move {
            let mut last = updates.borrow_and_update().status();
            println!("{:<10}  {last}", queue.as_str());
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = updates.borrow_and_update().status();
                        if status != last {
                            println!("{:<10}  {status}", queue.as_str());
                            last = status;
                        }
                    }
                }
            }
        });

        let token = shutdown.clone();
        tasks.spawn(async move { processor.run(token).await });
    }

    println!("{}", "Processing; press Ctrl-C to stop".bold());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!("Shutting down");
    shutdown.cancel();

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            log::error!("Processor task failed: {e}");
        }
    }
    Ok(())
}
