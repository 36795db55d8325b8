//! mailroom CLI: store, search and manage captured mail in a SQLite database.
//! Config from env (.env supported) and optional CLI args.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docstore_sqlite::SqliteDocumentStore;
use mailroom_cli::{init_tracing, read_message, search_query, Cli, Commands};
use mailroom_storage::{MessageId, MessageStorage};
use tokio::io::AsyncWriteExt;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_file().as_deref())?;

    let storage = open_storage(&cli).await?;

    match cli.command {
        Commands::Store { room, file, id } => handle_store(&storage, &room, &file, id).await,
        Commands::List {
            room,
            from,
            to,
            content,
            offset,
            limit,
        } => {
            let query = search_query(from, to, content);
            let page = storage
                .messages_repo(&room)
                .list(&query, offset, limit)
                .await
                .context("List messages")?;

            println!("{} message(s) total, showing {}:\n", page.total, page.len());
            println!("{:<36} {:<26} {:<30} {}", "id", "date", "from", "subject");
            println!("{}", "-".repeat(120));
            for message in &page.messages {
                let email = message.email();
                let from = email
                    .from
                    .first()
                    .map(|a| a.address.as_str())
                    .unwrap_or("-");
                println!(
                    "{:<36} {:<26} {:<30} {}",
                    message.id,
                    email.date.format("%Y-%m-%d %H:%M:%S"),
                    from,
                    email.subject
                );
            }
            Ok(())
        }
        Commands::Load { room, id } => {
            let message = storage
                .messages_repo(&room)
                .load(&MessageId::from(id))
                .await
                .context("Load message")?;
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(message.origin.as_deref().unwrap_or_default())
                .await
                .context("Write message")?;
            stdout.flush().await.context("Write message")?;
            Ok(())
        }
        Commands::Delete { room, id } => {
            storage
                .messages_repo(&room)
                .delete(&MessageId::from(id.clone()))
                .await
                .context("Delete message")?;
            println!("Deleted {}", id);
            Ok(())
        }
        Commands::Count { room } => {
            let count = storage.messages_repo(&room).count().await.context("Count messages")?;
            println!("{}", count);
            Ok(())
        }
        Commands::Rooms { offset, limit } => {
            let rooms = storage
                .rooms_repo()
                .list(offset, limit)
                .await
                .context("List rooms")?;
            if rooms.is_empty() {
                println!("No rooms.");
            }
            for room in rooms {
                println!("{}", room);
            }
            Ok(())
        }
        Commands::RoomCount => {
            let count = storage.rooms_repo().count().await.context("Count rooms")?;
            println!("{}", count);
            Ok(())
        }
        Commands::DeleteRoom { room } => {
            let removed = storage
                .rooms_repo()
                .delete(&room)
                .await
                .context("Delete room")?;
            println!("Deleted {} message(s)", removed);
            Ok(())
        }
    }
}

/// Opens the SQLite store and prepares it for message storage.
async fn open_storage(cli: &Cli) -> Result<MessageStorage> {
    let database_url = cli.database_url();
    let config = cli.storage_config()?;
    info!(database_url = %database_url, per_room_limit = config.per_room_limit, "Opening storage");

    let store = SqliteDocumentStore::new(&database_url)
        .await
        .with_context(|| format!("Open database {} (check DATABASE_URL)", database_url))?;
    MessageStorage::create(Arc::new(store), config)
        .await
        .context("Prepare message storage")
}

/// Handle the store command.
async fn handle_store(
    storage: &MessageStorage,
    room: &str,
    file: &str,
    id: Option<String>,
) -> Result<()> {
    let message = read_message(file, id).await?;
    let stored = storage
        .messages_repo(room)
        .store(&message)
        .await
        .context("Store message")?;

    println!("{}", stored);
    Ok(())
}
