use event_streams::shared::infrastructure::event_store::stream_store::StreamStore;
use event_streams::shared::infrastructure::event_store::{Event, ExpectedVersion};
use event_streams::shared::infrastructure::key_value::in_memory::InMemoryKeyValueBackend;
use event_streams::shell::config;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = config::from_env()?;

    // In-memory backend for now
    let backend = Arc::new(InMemoryKeyValueBackend::new());
    let store = StreamStore::with_config(backend, &config);
    store.provision().await?;

    let stream = format!("Pony-{}", Uuid::now_v7());
    let jumps = [("SparkleHooves", 5), ("DerpyHooves", 5)];
    for (expected, (pony, height)) in jumps.into_iter().enumerate() {
        let event = Event::new("PonyJumped", json!({ "pony": pony, "height": height }));
        store
            .write(&stream, &event, ExpectedVersion::Exact(expected as u64))
            .await?;
    }

    let snapshot = store.read::<Value>(&stream).await?;
    tracing::info!(
        stream = %snapshot.name,
        version = snapshot.version,
        table = store.table(),
        "read stream"
    );
    for event in snapshot.events {
        let event = event?;
        tracing::info!(
            order_key = %event.order_key,
            event_type = %event.event_type,
            payload = %event.payload,
            "event"
        );
    }
    Ok(())
}
