//! DocSync CLI
//!
//! Browses and edits a paged, partitioned document store. A JSON fixture
//! file plays the part of the remote store.
//!
//! # Commands
//!
//! - `browse` - Load a partition page by page and print it
//! - `put` - Create or replace a User document
//! - `delete` - Delete a User document

mod commands;
mod fixture;

use clap::{Parser, Subcommand};
use docsync_engine::{SessionConfig, StorageSession};
use docsync_protocol::{Authorization, PartitionId};
use fixture::Fixture;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Paged document store browser.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON fixture standing in for the remote store
    #[arg(global = true, short, long, default_value = "docsync.json")]
    fixture: PathBuf,

    /// Act as a signed-in user (grants access to the User partition)
    #[arg(global = true, short, long)]
    signed_in: bool,

    /// Documents requested per page
    #[arg(global = true, long, default_value = "100")]
    page_size: u32,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a partition page by page and print it
    Browse {
        /// Partition to browse (app, user)
        #[arg(default_value = "app")]
        partition: PartitionId,

        /// Additional pages to load after the first
        #[arg(short, long, default_value = "0")]
        pages: usize,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create or replace a User document
    Put {
        /// Document id
        id: String,

        /// Document content as JSON
        content: String,

        /// Replace an existing document instead of creating one
        #[arg(short, long)]
        replace: bool,

        /// Device cache lifetime in seconds (0 = no cache, -1 = forever)
        #[arg(long, allow_hyphen_values = true)]
        ttl: Option<i64>,
    },

    /// Delete a User document
    Delete {
        /// Document id
        id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = Runtime::new()?;
    let store = Arc::new(Fixture::load(&cli.fixture)?.to_store()?);
    let config = SessionConfig::new(Authorization::new(cli.signed_in)).with_page_size(cli.page_size);
    let mut session = StorageSession::open(Arc::clone(&store), config, runtime.handle().clone());

    match cli.command {
        Commands::Browse {
            partition,
            pages,
            format,
        } => {
            commands::browse::run(&mut session, &runtime, partition, pages, &format)?;
        }
        Commands::Put {
            id,
            content,
            replace,
            ttl,
        } => {
            commands::write::run_put(&mut session, &runtime, &id, &content, replace, ttl)?;
            Fixture::from_store(&store).save(&cli.fixture)?;
        }
        Commands::Delete { id } => {
            commands::write::run_delete(&mut session, &runtime, &id)?;
            Fixture::from_store(&store).save(&cli.fixture)?;
        }
    }

    Ok(())
}
