use crate::types::EnrichedItem;
use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// One cache slot per item link: either a finished enrichment or one that is
/// currently in flight.
enum Slot {
    Ready(EnrichedItem),
    Pending(watch::Sender<Option<EnrichedItem>>),
}

/// How a caller should proceed after announcing interest in a link.
pub(crate) enum Begin {
    /// Already enriched; use the cached result.
    Hit(EnrichedItem),
    /// Another caller is enriching this link; await its result.
    Wait(watch::Receiver<Option<EnrichedItem>>),
    /// This caller owns the enrichment and must call `complete`.
    Claimed,
}

/// In-memory enrichment cache keyed by item link. At most one entry per
/// link; no eviction beyond a full clear, since the display-window
/// truncation upstream bounds its size. Pending slots de-duplicate
/// concurrent enrichment of the same link.
#[derive(Default)]
pub struct AnalysisCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, link: &str) -> Option<EnrichedItem> {
        let slots = self.slots.lock().await;
        match slots.get(link) {
            Some(Slot::Ready(item)) => Some(item.clone()),
            _ => None,
        }
    }

    pub async fn put(&self, link: &str, item: EnrichedItem) {
        let mut slots = self.slots.lock().await;
        slots.insert(link.to_string(), Slot::Ready(item));
    }

    /// Drop every entry, finished and in flight. Must be called whenever the
    /// enrichment credential changes: cached results may reflect the
    /// no-credential degraded path. Waiters on a dropped pending slot observe
    /// the closed channel and re-run enrichment themselves.
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        let dropped = slots.len();
        slots.clear();
        debug!("Cleared enrichment cache ({} entries)", dropped);
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    pub(crate) async fn begin(&self, link: &str) -> Begin {
        let mut slots = self.slots.lock().await;
        match slots.get(link) {
            Some(Slot::Ready(item)) => Begin::Hit(item.clone()),
            Some(Slot::Pending(tx)) => Begin::Wait(tx.subscribe()),
            None => {
                let (tx, _rx) = watch::channel(None);
                slots.insert(link.to_string(), Slot::Pending(tx));
                Begin::Claimed
            }
        }
    }

    /// Publish the result of a claimed enrichment. If the slot was cleared
    /// while the work was in flight the result is stale (produced under a
    /// superseded credential) and is discarded.
    pub(crate) async fn complete(&self, link: &str, item: &EnrichedItem) {
        let mut slots = self.slots.lock().await;
        match slots.remove(link) {
            Some(Slot::Pending(tx)) => {
                slots.insert(link.to_string(), Slot::Ready(item.clone()));
                let _ = tx.send(Some(item.clone()));
            }
            Some(ready @ Slot::Ready(_)) => {
                slots.insert(link.to_string(), ready);
            }
            None => {
                debug!("Discarding stale enrichment for {}", link);
            }
        }
    }
}
