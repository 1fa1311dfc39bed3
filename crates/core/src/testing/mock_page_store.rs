//! Mock page store for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, RwLock};

use crate::pages::{NewPage, Page, PageId, PageStore, StoreError};

/// Image reference given to pages written by a simulated concurrent upload.
pub const STOLEN_IMAGE_REF: &str = "concurrent-upload";

/// In-memory implementation of the PageStore trait.
///
/// Provides controllable behavior for testing:
/// - Atomic or per-record batch inserts
/// - Injected insert, read, list and delete failures
/// - Simulated latency, before an insert writes or after it has written
/// - A read barrier that makes concurrent uploads observe the same watermark
/// - Simulated concurrent uploads that claim the numbers being inserted
///
/// Clones share state, so a test can keep one handle while the sequencer
/// owns another.
///
/// # Example
///
/// ```rust,ignore
/// use manga_admin_core::testing::MockPageStore;
///
/// let store = MockPageStore::per_record();
/// store.seed_pages("ch-1", 1..=3).await;
/// store.fail_insert_at(2, StoreError::Unavailable("disk full".into())).await;
///
/// // Run an upload...
///
/// assert_eq!(store.page_numbers("ch-1").await, vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct MockPageStore {
    atomic: bool,
    /// Stored pages.
    pages: Arc<RwLock<Vec<Page>>>,
    /// Last assigned page id.
    last_id: Arc<RwLock<PageId>>,
    /// Number of `insert_pages` calls made.
    insert_calls: Arc<RwLock<usize>>,
    /// Number of `max_page_number` calls made.
    read_calls: Arc<RwLock<usize>>,
    /// Failures keyed by 1-based `insert_pages` call number.
    insert_failures: Arc<RwLock<HashMap<usize, StoreError>>>,
    /// If set, the next read fails with this error.
    next_read_error: Arc<RwLock<Option<StoreError>>>,
    /// If set, every delete fails with this error.
    delete_error: Arc<RwLock<Option<StoreError>>>,
    /// If set, every `list_pages` call fails with this error.
    list_error: Arc<RwLock<Option<StoreError>>>,
    /// Reply delays keyed by 1-based `insert_pages` call number, applied
    /// after the records were written.
    reply_delays: Arc<RwLock<HashMap<usize, Duration>>>,
    /// Ids removed through `delete_pages`.
    deleted: Arc<RwLock<Vec<PageId>>>,
    /// Simulated read latency in milliseconds.
    read_delay_ms: Arc<RwLock<u64>>,
    /// Simulated insert latency in milliseconds.
    insert_delay_ms: Arc<RwLock<u64>>,
    /// Barrier shared by the next reads, with the number of reads left to hold.
    read_barrier: Arc<RwLock<Option<(Arc<Barrier>, usize)>>>,
    /// Inserts left that lose their first number to a concurrent upload.
    steal_inserts: Arc<RwLock<u32>>,
}

impl Default for MockPageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPageStore {
    /// Create a mock store that inserts batches atomically.
    pub fn new() -> Self {
        Self::with_atomicity(true)
    }

    /// Create a mock store that inserts records one by one.
    pub fn per_record() -> Self {
        Self::with_atomicity(false)
    }

    fn with_atomicity(atomic: bool) -> Self {
        Self {
            atomic,
            pages: Arc::new(RwLock::new(Vec::new())),
            last_id: Arc::new(RwLock::new(0)),
            insert_calls: Arc::new(RwLock::new(0)),
            read_calls: Arc::new(RwLock::new(0)),
            insert_failures: Arc::new(RwLock::new(HashMap::new())),
            next_read_error: Arc::new(RwLock::new(None)),
            delete_error: Arc::new(RwLock::new(None)),
            list_error: Arc::new(RwLock::new(None)),
            reply_delays: Arc::new(RwLock::new(HashMap::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            read_delay_ms: Arc::new(RwLock::new(0)),
            insert_delay_ms: Arc::new(RwLock::new(0)),
            read_barrier: Arc::new(RwLock::new(None)),
            steal_inserts: Arc::new(RwLock::new(0)),
        }
    }

    /// Add pages directly, bypassing injected behavior.
    pub async fn seed_pages(&self, chapter_id: &str, numbers: RangeInclusive<u32>) {
        let mut pages = self.pages.write().await;
        for page_number in numbers {
            let id = self.next_id().await;
            pages.push(Page {
                id,
                chapter_id: chapter_id.to_string(),
                page_number,
                image_ref: format!("seed-{}.png", page_number),
                created_at: Utc::now(),
            });
        }
    }

    /// Pages of a chapter ordered by page number.
    pub async fn pages(&self, chapter_id: &str) -> Vec<Page> {
        let mut pages: Vec<Page> = self
            .pages
            .read()
            .await
            .iter()
            .filter(|p| p.chapter_id == chapter_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }

    /// Page numbers of a chapter in ascending order.
    pub async fn page_numbers(&self, chapter_id: &str) -> Vec<u32> {
        self.pages(chapter_id)
            .await
            .iter()
            .map(|p| p.page_number)
            .collect()
    }

    /// Get the number of `insert_pages` calls made.
    pub async fn insert_calls(&self) -> usize {
        *self.insert_calls.read().await
    }

    /// Get the number of `max_page_number` calls made.
    pub async fn read_calls(&self) -> usize {
        *self.read_calls.read().await
    }

    /// Ids removed through `delete_pages`.
    pub async fn deleted_ids(&self) -> Vec<PageId> {
        self.deleted.read().await.clone()
    }

    /// Fail the `call`-th `insert_pages` call (1-based) without writing.
    pub async fn fail_insert_at(&self, call: usize, error: StoreError) {
        self.insert_failures.write().await.insert(call, error);
    }

    /// Configure the next read to fail with the given error.
    pub async fn set_next_read_error(&self, error: StoreError) {
        *self.next_read_error.write().await = Some(error);
    }

    /// Make every delete fail with the given error.
    pub async fn fail_deletes(&self, error: StoreError) {
        *self.delete_error.write().await = Some(error);
    }

    /// Make every `list_pages` call fail with the given error.
    pub async fn fail_lists(&self, error: StoreError) {
        *self.list_error.write().await = Some(error);
    }

    /// Let the `call`-th `insert_pages` call (1-based) write its records,
    /// then wait `delay` before replying.
    pub async fn slow_reply_at(&self, call: usize, delay: Duration) {
        self.reply_delays.write().await.insert(call, delay);
    }

    /// Set the simulated read latency.
    pub async fn set_read_delay(&self, delay: Duration) {
        *self.read_delay_ms.write().await = millis(delay);
    }

    /// Set the simulated insert latency, applied before anything is written.
    pub async fn set_insert_delay(&self, delay: Duration) {
        *self.insert_delay_ms.write().await = millis(delay);
    }

    /// Hold the next `readers` reads until all of them have read the
    /// watermark.
    pub async fn hold_reads(&self, readers: usize) {
        *self.read_barrier.write().await = Some((Arc::new(Barrier::new(readers)), readers));
    }

    /// Let a simulated concurrent upload claim the first number of each of
    /// the next `count` inserts just before they land.
    pub async fn steal_numbers_on_next_inserts(&self, count: u32) {
        *self.steal_inserts.write().await = count;
    }

    async fn next_id(&self) -> PageId {
        let mut last_id = self.last_id.write().await;
        *last_id += 1;
        *last_id
    }

    async fn take_read_barrier(&self) -> Option<Arc<Barrier>> {
        let mut slot = self.read_barrier.write().await;
        match slot.as_mut() {
            Some((barrier, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Some(Arc::clone(barrier))
            }
            _ => None,
        }
    }

    async fn take_steal(&self) -> bool {
        let mut remaining = self.steal_inserts.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }

    async fn delay(ms: &RwLock<u64>) {
        let ms = *ms.read().await;
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl PageStore for MockPageStore {
    fn name(&self) -> &str {
        "mock"
    }

    fn atomic_batches(&self) -> bool {
        self.atomic
    }

    async fn max_page_number(&self, chapter_id: &str) -> Result<Option<u32>, StoreError> {
        *self.read_calls.write().await += 1;
        Self::delay(&self.read_delay_ms).await;

        if let Some(error) = self.next_read_error.write().await.take() {
            return Err(error);
        }

        let max = self
            .pages
            .read()
            .await
            .iter()
            .filter(|p| p.chapter_id == chapter_id)
            .map(|p| p.page_number)
            .max();

        if let Some(barrier) = self.take_read_barrier().await {
            barrier.wait().await;
        }

        Ok(max)
    }

    async fn insert_pages(&self, new_pages: &[NewPage]) -> Result<Vec<PageId>, StoreError> {
        let call = {
            let mut calls = self.insert_calls.write().await;
            *calls += 1;
            *calls
        };
        Self::delay(&self.insert_delay_ms).await;

        if let Some(error) = self.insert_failures.write().await.remove(&call) {
            return Err(error);
        }

        let mut pages = self.pages.write().await;

        if let Some(first) = new_pages.first() {
            if self.take_steal().await {
                let id = self.next_id().await;
                pages.push(Page {
                    id,
                    chapter_id: first.chapter_id.clone(),
                    page_number: first.page_number,
                    image_ref: STOLEN_IMAGE_REF.to_string(),
                    created_at: Utc::now(),
                });
            }
        }

        let taken = |pages: &[Page], new_page: &NewPage| {
            pages.iter().any(|p| {
                p.chapter_id == new_page.chapter_id && p.page_number == new_page.page_number
            })
        };

        if self.atomic {
            if let Some(conflict) = new_pages.iter().find(|np| taken(&pages, np)) {
                return Err(StoreError::UniqueViolation {
                    chapter_id: conflict.chapter_id.clone(),
                    page_number: conflict.page_number,
                });
            }
        }

        let mut ids = Vec::with_capacity(new_pages.len());
        for new_page in new_pages {
            if taken(&pages, new_page) {
                return Err(StoreError::UniqueViolation {
                    chapter_id: new_page.chapter_id.clone(),
                    page_number: new_page.page_number,
                });
            }
            let id = self.next_id().await;
            pages.push(Page {
                id,
                chapter_id: new_page.chapter_id.clone(),
                page_number: new_page.page_number,
                image_ref: new_page.image_ref.clone(),
                created_at: Utc::now(),
            });
            ids.push(id);
        }
        drop(pages);

        let reply_delay = self.reply_delays.write().await.remove(&call);
        if let Some(delay) = reply_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(ids)
    }

    async fn delete_pages(&self, ids: &[PageId]) -> Result<(), StoreError> {
        if let Some(ref error) = *self.delete_error.read().await {
            return Err(error.clone());
        }

        self.pages.write().await.retain(|p| !ids.contains(&p.id));
        self.deleted.write().await.extend_from_slice(ids);
        Ok(())
    }

    async fn list_pages(&self, chapter_id: &str) -> Result<Vec<Page>, StoreError> {
        if let Some(ref error) = *self.list_error.read().await {
            return Err(error.clone());
        }
        Ok(self.pages(chapter_id).await)
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
