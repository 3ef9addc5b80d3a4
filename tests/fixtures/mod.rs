// Shared fixtures for the integration tests.

use event_streams::shared::infrastructure::event_store::Event;
use event_streams::shared::infrastructure::event_store::stream_store::StreamStore;
use event_streams::shared::infrastructure::key_value::in_memory::InMemoryKeyValueBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PonyJumped {
    pub pony: String,
    pub height: u32,
}

pub fn pony_jumped(pony: &str, height: u32) -> Event<PonyJumped> {
    Event::new(
        "PonyJumped",
        PonyJumped {
            pony: pony.to_string(),
            height,
        },
    )
}

pub async fn provisioned_store(table: &str) -> StreamStore<InMemoryKeyValueBackend> {
    let store = StreamStore::new(Arc::new(InMemoryKeyValueBackend::new()), table);
    store.provision().await.expect("provision failed");
    store
}
