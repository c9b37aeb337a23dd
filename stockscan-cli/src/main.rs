mod input;

use std::future::Future;
use std::path::PathBuf;

use chrono::Local;
use stockscan_core::{
    BarcodeStockIn, NotificationChannel, ScanBuffer, ScanConfig, ScanHistory, ScanKey,
    ScannedItem, StockApi,
};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::input::{spawn_stdin_reader, KeyBatch};

struct Session {
    config: ScanConfig,
    api: StockApi,
    history: ScanHistory,
    channel: NotificationChannel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ScanConfig::load();
    let history = load_history(&config).await;
    let api = StockApi::new(&config)?;
    let channel = NotificationChannel::new(&config, history.clone())?;
    let session = Session {
        config,
        api,
        history,
        channel,
    };

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("interrupted");
    };
    run(&session, spawn_stdin_reader(), interrupted).await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn data_dir(config: &ScanConfig) -> PathBuf {
    match config.resolved_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!(error = %e, "no data directory, keeping history next to the binary");
            PathBuf::from(".")
        }
    }
}

async fn load_history(config: &ScanConfig) -> ScanHistory {
    ScanHistory::hydrate_from_dir(data_dir(config), config.history_capacity).await
}

/// Drives the session until input ends or `shutdown` resolves, then closes
/// the notification channel.
async fn run(session: &Session, keys: mpsc::Receiver<KeyBatch>, shutdown: impl Future<Output = ()>) {
    session.channel.connect();
    let renderer = tokio::spawn(render_updates(session.history.subscribe()));
    print_history(&session.history.items().await);
    info!(api = %session.config.api_base_url, "ready, scan a barcode (:list, :clear)");

    tokio::select! {
        _ = scan_loop(session, keys) => info!("input closed"),
        _ = shutdown => {}
    }

    session.channel.disconnect();
    renderer.abort();
}

async fn scan_loop(session: &Session, mut keys: mpsc::Receiver<KeyBatch>) {
    let mut buffer = ScanBuffer::new(ScanKey::Enter, session.config.scan_timeout());
    while let Some(batch) = keys.recv().await {
        for c in batch.text.chars() {
            if let Some(input) = buffer.push(ScanKey::from_char(c), batch.at) {
                handle_input(input.trim(), session).await;
            }
        }
    }
}

async fn handle_input(input: &str, session: &Session) {
    match input {
        "" => {}
        ":list" => print_history(&session.history.items().await),
        ":clear" => session.history.clear().await,
        barcode => {
            let request = BarcodeStockIn::new(barcode).at(session.config.default_location.clone());
            match session.api.stock_in(&request).await {
                Ok(result) => {
                    session.history.append(result.to_new_scan()).await;
                }
                Err(e) => error!(error = %e, %barcode, "stock-in failed"),
            }
        }
    }
}

async fn render_updates(mut updates: watch::Receiver<Vec<ScannedItem>>) {
    while updates.changed().await.is_ok() {
        let latest = updates.borrow_and_update().first().cloned();
        match latest {
            Some(item) => println!("{}", format_item(&item)),
            None => println!("-- history cleared --"),
        }
    }
}

fn print_history(items: &[ScannedItem]) {
    if items.is_empty() {
        println!("-- no scans yet --");
        return;
    }
    for item in items {
        println!("{}", format_item(item));
    }
}

fn format_item(item: &ScannedItem) -> String {
    let time = item.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let marker = if item.is_new { "NEW" } else { "   " };
    let category = item.category_name.as_deref().unwrap_or("-");
    format!(
        "{time} {marker} {:<16} {:<24} {:<10} x{:<4} [{category}]",
        item.barcode, item.item_name, item.location, item.quantity
    )
}
