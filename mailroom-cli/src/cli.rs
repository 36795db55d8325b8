//! CLI parser and config loading.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailroom_storage::{
    CapturedMessage, SearchQuery, StorageConfig, SEARCH_PARAM_CONTENT, SEARCH_PARAM_FROM,
    SEARCH_PARAM_TO,
};

pub const DEFAULT_DATABASE_URL: &str = "./mailroom.db";

#[derive(Parser, Debug)]
#[command(name = "mailroom")]
#[command(about = "Room-scoped store for captured mail", long_about = None)]
#[command(version)]
pub struct Cli {
    /// SQLite database path or `sqlite:` URL (overrides DATABASE_URL).
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Messages kept per room before it is flushed (overrides MAILROOM_PER_ROOM_LIMIT).
    #[arg(long, global = true)]
    pub per_room_limit: Option<usize>,

    /// Also write logs to this file (overrides LOG_FILE).
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Store a raw message file in a room.
    Store {
        #[arg(short, long, default_value = "")]
        room: String,
        /// Raw message (headers and body).
        #[arg(short, long)]
        file: String,
        /// Message id; a random UUID when omitted.
        #[arg(long)]
        id: Option<String>,
    },
    /// List messages in a room, newest first.
    List {
        #[arg(short, long, default_value = "")]
        room: String,
        /// Pattern on sender name or address.
        #[arg(long)]
        from: Option<String>,
        /// Pattern on recipient name or address.
        #[arg(long)]
        to: Option<String>,
        /// Pattern on subject.
        #[arg(long)]
        content: Option<String>,
        #[arg(long, default_value = "0")]
        offset: usize,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Write one message's raw bytes to stdout.
    Load {
        #[arg(short, long, default_value = "")]
        room: String,
        #[arg(long)]
        id: String,
    },
    /// Delete one message.
    Delete {
        #[arg(short, long, default_value = "")]
        room: String,
        #[arg(long)]
        id: String,
    },
    /// Number of messages in a room.
    Count {
        #[arg(short, long, default_value = "")]
        room: String,
    },
    /// List rooms that hold messages, ascending.
    Rooms {
        #[arg(long, default_value = "0")]
        offset: usize,
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
    /// Number of rooms.
    RoomCount,
    /// Delete every message in a room.
    DeleteRoom {
        #[arg(short, long, default_value = "")]
        room: String,
    },
}

impl Cli {
    /// Database location: flag, then DATABASE_URL, then the default file.
    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }

    pub fn log_file(&self) -> Option<String> {
        self.log_file.clone().or_else(|| std::env::var("LOG_FILE").ok())
    }

    /// Storage config from the environment, with flag overrides applied.
    pub fn storage_config(&self) -> Result<StorageConfig> {
        let mut config = StorageConfig::from_env().context("Load storage config from environment")?;
        if let Some(limit) = self.per_room_limit {
            config.per_room_limit = limit;
        }
        Ok(config)
    }
}

/// Builds the search query from the `list` flags.
pub fn search_query(from: Option<String>, to: Option<String>, content: Option<String>) -> SearchQuery {
    [
        (SEARCH_PARAM_FROM, from),
        (SEARCH_PARAM_TO, to),
        (SEARCH_PARAM_CONTENT, content),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key, v)))
    .collect()
}

/// Reads a raw message file byte for byte, whatever its charset.
///
/// The id defaults to a random UUID.
pub async fn read_message(file: &str, id: Option<String>) -> Result<CapturedMessage> {
    let origin = tokio::fs::read(file)
        .await
        .with_context(|| format!("Read message file {}", file))?;
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    Ok(CapturedMessage::new(id).with_origin(origin))
}
