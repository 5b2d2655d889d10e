//! Courier - block-event subscription registry admin tool.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema migrations
//! courier migrate
//!
//! # Register an application for new-block notifications of group 1
//! courier subscribe --app-id wallet --group-id 1 \
//!     --exchange blocks --queue wallet.blocks --routing-key group.1
//!
//! # Resolve what the dispatcher would publish to for group 1
//! courier list --group-id 1
//!
//! # Environment overrides
//! DATABASE_URL=postgres://localhost/courier LOG_LEVEL=debug courier list
//!
//! # Throwaway process-local store, no database needed
//! courier --store memory count
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use courier_core::metrics::init_metrics;
use courier_core::models::{NewSubscription, SubscriptionId};
use courier_core::ports::SubscriptionRepository;
use courier_core::services::SubscriptionRegistry;
use courier_storage::{
    Database, DatabaseConfig, MemorySubscriptionRepository, PgSubscriptionRepository,
};

type Registry = SubscriptionRegistry<dyn SubscriptionRepository>;

/// Courier CLI - block-event subscription registry.
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Courier - manage new-block notification subscriptions")]
#[command(version)]
struct Cli {
    /// Storage backend.
    #[arg(long, global = true, env = "STORE", value_enum, default_value = "postgres")]
    store: StoreKind,

    /// PostgreSQL database URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/courier"
    )]
    database_url: String,

    /// Enable JSON log output.
    #[arg(long, global = true, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Which adapter backs the registry.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StoreKind {
    /// PostgreSQL, migrated on startup.
    Postgres,
    /// Process-local; records are gone when the command exits.
    Memory,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply database migrations and exit.
    Migrate,

    /// Register a new subscription.
    Subscribe(SubscribeArgs),

    /// Show one subscription by id.
    Show {
        /// Subscription id.
        id: SubscriptionId,
    },

    /// List subscriptions, optionally filtered.
    List(ListArgs),

    /// Check whether an app already holds an exchange + queue pair.
    Check {
        #[arg(long)]
        app_id: String,
        #[arg(long)]
        exchange: String,
        #[arg(long)]
        queue: String,
    },

    /// Print the number of subscriptions.
    Count,

    /// Remove a subscription by id.
    Remove {
        /// Subscription id.
        id: SubscriptionId,

        /// Skip confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct SubscribeArgs {
    /// Subscribing application.
    #[arg(long)]
    app_id: String,
    /// Monitored group.
    #[arg(long, allow_negative_numbers = true)]
    group_id: i32,
    /// Target exchange.
    #[arg(long)]
    exchange: String,
    /// Target queue.
    #[arg(long)]
    queue: String,
    /// Routing key.
    #[arg(long)]
    routing_key: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Only this application.
    #[arg(long, conflicts_with_all = ["group_id", "queue", "exchange"])]
    app_id: Option<String>,
    /// Only this group.
    #[arg(long, allow_negative_numbers = true, conflicts_with_all = ["queue", "exchange"])]
    group_id: Option<i32>,
    /// Only this queue name.
    #[arg(long, conflicts_with = "exchange")]
    queue: Option<String>,
    /// Only this exchange (requires --routing-key).
    #[arg(long, requires = "routing_key")]
    exchange: Option<String>,
    /// Routing key paired with --exchange.
    #[arg(long, requires = "exchange")]
    routing_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);
    init_metrics();

    let (repository, db): (Arc<dyn SubscriptionRepository>, Option<Database>) = match cli.store {
        StoreKind::Postgres => {
            debug!(database_url = %mask_password(&cli.database_url), "Database endpoint");

            let db = Database::connect(&DatabaseConfig::for_admin(&cli.database_url))
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;

            let repository: Arc<dyn SubscriptionRepository> =
                Arc::new(PgSubscriptionRepository::new(&db));
            (repository, Some(db))
        }
        StoreKind::Memory => {
            warn!("⚠️  Using in-memory store; nothing is persisted");
            let repository: Arc<dyn SubscriptionRepository> =
                Arc::new(MemorySubscriptionRepository::new());
            (repository, None)
        }
    };

    let result = run(&SubscriptionRegistry::new(repository), cli.command).await;

    if let Some(db) = db {
        db.close().await;
    }
    result
}

/// Execute one registry command.
async fn run(registry: &Registry, command: Command) -> Result<()> {
    match command {
        Command::Migrate => {
            info!("🗄️  Schema up to date");
            Ok(())
        }
        Command::Subscribe(args) => {
            let request = NewSubscription::new(
                args.app_id,
                args.group_id,
                args.exchange,
                args.queue,
                args.routing_key,
            );
            let created = registry
                .create(request)
                .await
                .context("Failed to register subscription")?;
            print_json(&created)
        }
        Command::Show { id } => {
            let subscription = registry.get_by_id(id).await?;
            print_json(&subscription)
        }
        Command::List(args) => {
            let subscriptions = if let Some(app_id) = args.app_id {
                registry.list_by_app_id(&app_id).await?
            } else if let Some(group_id) = args.group_id {
                registry.list_by_group_id(group_id).await?
            } else if let Some(queue) = args.queue {
                registry.list_by_queue_name(&queue).await?
            } else if let (Some(exchange), Some(key)) = (args.exchange, args.routing_key) {
                registry.find_binding(&exchange, &key).await?
            } else {
                registry.list_all().await?
            };
            debug!(count = subscriptions.len(), "Listed subscriptions");
            print_json(&subscriptions)
        }
        Command::Check {
            app_id,
            exchange,
            queue,
        } => {
            let exists = registry.exists(&app_id, &exchange, &queue).await?;
            print_json(&serde_json::json!({ "exists": exists }))
        }
        Command::Count => {
            let count = registry.count().await?;
            print_json(&serde_json::json!({ "count": count }))
        }
        Command::Remove { id, yes } => {
            let subscription = registry.get_by_id(id).await?;
            warn!(
                id = %subscription.id,
                app_id = %subscription.app_id,
                queue = %subscription.queue_name,
                "⚠️  Removing subscription; its application stops receiving block notifications"
            );

            if !yes && !confirm("Remove this subscription?")? {
                info!("❌ Removal cancelled");
                return Ok(());
            }

            let removed = registry.delete(id).await?;
            print_json(&removed)
        }
    }
}

/// Write a value to stdout as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", out);
    Ok(())
}

/// Ask a yes/no question on the terminal.
fn confirm(question: &str) -> Result<bool> {
    print!("\n🔴 {} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Initialize tracing subscriber. Logs go to stderr so stdout stays JSON.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}
