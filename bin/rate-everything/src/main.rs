//! # RateEverything Binary
//!
//! Assembles a document store from compile-time features and configuration,
//! then prints the leaderboards.

use std::sync::Arc;

use anyhow::Context;
use re_config::{Settings, StoreBackend};
use re_core::{DocumentStore, RankedItem};
use re_services::Services;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings);
    match &settings.env_file {
        Some(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        None => tracing::debug!("no .env file loaded"),
    }

    let store = open_store(&settings).await?;
    let services = Services::new(store);
    let limit = settings.leaderboard.limit;

    let items = services.items.item_count().await?;
    tracing::info!(items, limit, "building leaderboards");

    let top = services.stats.get_top_rated(limit).await?;
    print_board("Top rated", &top);

    let reviewed = services.stats.get_most_reviewed(limit).await?;
    print_board("Most reviewed", &reviewed);

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match settings.store.backend {
        #[cfg(feature = "store-sqlite")]
        StoreBackend::Sqlite => {
            let store = re_store_sqlite::SqliteDocumentStore::new(&settings.store.sqlite_url)
                .await
                .with_context(|| format!("opening {}", settings.store.sqlite_url))?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "store-memory")]
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; nothing will be persisted");
            Ok(Arc::new(re_store_memory::MemoryDocumentStore::new()))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("store backend {other:?} is not compiled into this binary"),
    }
}

fn print_board(title: &str, board: &[RankedItem]) {
    println!("{title}");
    if board.is_empty() {
        println!("  (no rated items yet)");
    }
    for (rank, entry) in board.iter().enumerate() {
        println!(
            "  {:>2}. {:<40} {:.2} avg  {:>4} ratings",
            rank + 1,
            entry.item.title,
            entry.stats.average_rating,
            entry.stats.total_ratings
        );
    }
}
