//! Read-through cache keyed by `(project_id, resource)`.
//!
//! [`ResourceCache::invalidate`] marks an entry stale but keeps its last known
//! value, so views built from [`ResourceCache::peek`] never go blank while a
//! refetch is in flight. A fetch that was started before an invalidation may
//! replace that value, but the entry stays stale and the next read fetches
//! again. A fetch never replaces a value loaded by a fetch that started later.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use crate::models::{LogEntry, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Messages,
    Logs,
}

pub type CacheKey = (i64, Resource);

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Messages(Vec<Message>),
    Logs(Vec<LogEntry>),
}

impl CachedValue {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Messages(messages) => messages,
            Self::Logs(_) => Vec::new(),
        }
    }

    pub fn into_logs(self) -> Vec<LogEntry> {
        match self {
            Self::Logs(logs) => logs,
            Self::Messages(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    /// Bumped by every invalidation.
    generation: u64,
    value: Option<CachedValue>,
    /// Generation the stored value was fetched in.
    value_generation: u64,
    fresh: bool,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last known value without fetching, stale or not.
    pub fn peek(&self, key: CacheKey) -> Option<CachedValue> {
        self.slots().get(&key).and_then(|slot| slot.value.clone())
    }

    /// Whether `get_or_fetch` would answer from the cache.
    pub fn is_fresh(&self, key: CacheKey) -> bool {
        self.slots()
            .get(&key)
            .is_some_and(|slot| slot.fresh && slot.value.is_some())
    }

    /// Return the cached value, or run `fetch` and cache its result.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetch: F) -> Result<CachedValue, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue, E>>,
    {
        let generation = {
            let mut slots = self.slots();
            let slot = slots.entry(key).or_default();
            if slot.fresh {
                if let Some(value) = &slot.value {
                    return Ok(value.clone());
                }
            }
            slot.generation
        };

        let value = fetch().await?;

        let mut slots = self.slots();
        let slot = slots.entry(key).or_default();
        if generation < slot.value_generation {
            tracing::trace!(?key, "discarding fetch older than the cached value");
            return Ok(value);
        }
        slot.value = Some(value.clone());
        slot.value_generation = generation;
        slot.fresh = slot.generation == generation;
        if !slot.fresh {
            tracing::trace!(?key, "fetch raced an invalidation, keeping it as stale");
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: CacheKey) {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_default();
        slot.generation += 1;
        slot.fresh = false;
    }

    /// Invalidate every resource of one project.
    pub fn invalidate_project(&self, project_id: i64) {
        for resource in [Resource::Messages, Resource::Logs] {
            self.invalidate((project_id, resource));
        }
    }

    /// Forget everything, including projects no longer observed.
    pub fn clear(&self) {
        let mut slots = self.slots();
        for slot in slots.values_mut() {
            slot.generation += 1;
            slot.value = None;
            slot.value_generation = slot.generation;
            slot.fresh = false;
        }
    }
}
