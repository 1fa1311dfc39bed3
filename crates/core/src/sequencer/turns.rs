//! Per-chapter turns.
//!
//! Uploads holding a turn for the same chapter run their pipelines one at a
//! time. Entries are created on demand and removed once the last holder or
//! waiter is gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Turns = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-chapter async locks.
#[derive(Default)]
pub struct TurnRegistry {
    turns: Mutex<Turns>,
}

impl TurnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the chapter's turn.
    pub async fn acquire(self: &Arc<Self>, chapter_id: &str) -> ChapterTurn {
        let lock = {
            let mut turns = self.lock_turns();
            turns
                .entry(chapter_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;

        ChapterTurn {
            registry: Arc::clone(self),
            chapter_id: chapter_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Chapters with a turn held or awaited.
    pub fn active(&self) -> usize {
        self.lock_turns().len()
    }

    fn lock_turns(&self) -> std::sync::MutexGuard<'_, Turns> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.turns.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, chapter_id: &str) {
        let mut turns = self.lock_turns();
        if let Some(lock) = turns.get(chapter_id) {
            if Arc::strong_count(lock) == 1 {
                turns.remove(chapter_id);
            }
        }
    }
}

/// A held turn. Dropping it lets the next upload for the chapter proceed.
pub struct ChapterTurn {
    registry: Arc<TurnRegistry>,
    chapter_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChapterTurn {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.release(&self.chapter_id);
    }
}
