//! Aegis Chat - terminal client for a streaming retrieval-augmented backend
//!
//! Backend frames arrive over a WebSocket, become typed events, and drive a
//! pure conversation reducer. The front-end renders the resulting state.

mod config;
mod ingest;
mod protocol;
mod runtime;
mod state_machine;
mod storage;
mod tui;

use config::ClientConfig;
use ingest::Ingestor;
use runtime::{restore_state, ChatRuntime, CHANNEL_CAPACITY, UPDATE_CAPACITY};
use storage::FileStore;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;

    // Logs go to a file; the terminal belongs to the UI
    std::fs::create_dir_all(&config.data_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aegis_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    tracing::info!(
        endpoint = %config.endpoint,
        data_dir = %config.data_dir.display(),
        reconnect = config.reconnect.enabled,
        "Starting aegis-chat"
    );

    let store = FileStore::new(&config.data_dir);
    let state = restore_state(&store).await;

    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (update_tx, update_rx) = broadcast::channel(UPDATE_CAPACITY);
    let cancel = CancellationToken::new();

    let ingestor = Ingestor::new(
        config.endpoint.clone(),
        config.reconnect,
        event_tx.clone(),
        outbound_rx,
        cancel.clone(),
    );
    let ingest_handle = tokio::spawn(async move {
        if let Err(e) = ingestor.run().await {
            tracing::error!(error = %e, "Ingestor stopped with error");
        }
    });

    let runtime = ChatRuntime::new(state.clone(), store, event_rx, outbound_tx, update_tx);
    let runtime_handle = tokio::spawn(runtime.run());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = tui::run(&mut terminal, state, update_rx, event_tx).await;
    tui::restore()?;

    // Dropping the last event sender lets the runtime drain and stop
    cancel.cancel();
    ingest_handle.await?;
    let final_state = runtime_handle.await?;
    tracing::info!(messages = final_state.messages.len(), "Shut down");

    result?;
    Ok(())
}
