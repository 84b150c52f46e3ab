//! Per-key fixed-window cooldown gate.
//!
//! A key is admitted when it has no recorded admission, or when at least
//! `window` has passed since its last one. Rejections never touch state, so
//! the next eligible instant stays anchored to the last admission.
//!
//! The map is held in an LRU whose recency only admissions refresh, so the
//! least recently used entry is also the one admitted longest ago. Capacity
//! is a soft bound: an entry is only evicted once its window has passed,
//! which makes it indistinguishable from an absent key. When every tracked
//! key is still cooling down the cache grows instead.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::{debug, trace};

use super::ConversationKey;

pub struct CooldownGate<K: Hash + Eq = ConversationKey> {
    window: Duration,
    state: Mutex<LruCache<K, Instant>>,
}

impl<K: Hash + Eq + Clone + std::fmt::Debug> CooldownGate<K> {
    /// `capacity` of zero is treated as one.
    pub fn new(window: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { window, state: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject `key` at `now`. Check and update happen under one lock.
    pub fn admit(&self, key: &K, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        match state.peek(key).copied() {
            Some(last) if now.saturating_duration_since(last) < self.window => return false,
            Some(_) => {}
            None => self.make_room(&mut state, now),
        }

        if let Some((evicted, _)) = state.push(key.clone(), now) {
            if &evicted != key {
                trace!(?evicted, "cooldown capacity reached; evicted expired key");
            }
        }
        true
    }

    /// Ensure inserting one more key cannot push out an entry that is still
    /// inside its window.
    fn make_room(&self, state: &mut LruCache<K, Instant>, now: Instant) {
        if state.len() < state.cap().get() {
            return;
        }
        let oldest_live = state
            .peek_lru()
            .is_some_and(|(_, last)| now.saturating_duration_since(*last) < self.window);
        if oldest_live {
            let grown = state.cap().saturating_add(state.cap().get());
            debug!(from = state.cap().get(), to = grown.get(), "every tracked key is cooling down; growing gate");
            state.resize(grown);
        }
    }

    /// Number of keys the gate holds before it has to evict or grow.
    pub fn capacity(&self) -> usize {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).cap().get()
    }

    /// Timestamp of the last admission for `key`, without refreshing recency.
    pub fn last_admitted(&self, key: &K) -> Option<Instant> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.peek(key).copied()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
