//! Batch committer.
//!
//! Persists assigned pages all-or-nothing. Atomic stores get the whole slice
//! in one call. Other stores get one record per call, and siblings that were
//! already written are deleted again if a later record fails or the caller
//! cancels.
//!
//! An insert that times out may still have been written. Its rows are found
//! again by page number and image reference and removed with the rest of
//! the batch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::SequencerError;
use crate::metrics;
use crate::pages::{NewPage, PageId, PageStore, StoreError};

/// Run a store call with an upper time bound.
pub(crate) async fn bounded<T, F>(
    timeout: Duration,
    operation: &str,
    call: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::TimedOut {
            operation: operation.to_string(),
            after: timeout,
        }),
    }
}

/// Why a commit did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitFailure {
    /// Another upload holds one of the assigned numbers. Nothing from this
    /// batch remains in the store.
    Conflict { page_number: u32 },
    /// Any other failure.
    Fatal(SequencerError),
}

impl From<SequencerError> for CommitFailure {
    fn from(err: SequencerError) -> Self {
        Self::Fatal(err)
    }
}

/// Writes assigned pages to a [`PageStore`].
pub struct BatchCommitter {
    store: Arc<dyn PageStore>,
    timeout: Duration,
}

impl BatchCommitter {
    pub fn new(store: Arc<dyn PageStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Commit `pages`, returning their ids in page-number order.
    pub async fn commit(
        &self,
        pages: &[NewPage],
        cancel: &CancellationToken,
    ) -> Result<Vec<PageId>, CommitFailure> {
        if cancel.is_cancelled() {
            return Err(SequencerError::Cancelled.into());
        }

        if self.store.atomic_batches() || pages.len() == 1 {
            self.commit_atomic(pages).await
        } else {
            self.commit_per_record(pages, cancel).await
        }
    }

    async fn commit_atomic(&self, pages: &[NewPage]) -> Result<Vec<PageId>, CommitFailure> {
        match bounded(self.timeout, "insert_pages", self.store.insert_pages(pages)).await {
            Ok(ids) => Ok(ids),
            Err(StoreError::UniqueViolation { page_number, .. }) => {
                Err(CommitFailure::Conflict { page_number })
            }
            Err(err @ StoreError::TimedOut { .. }) => {
                Err(self.recover_timed_out(pages, &[], &err).await.into())
            }
            Err(StoreError::Unavailable(reason)) => {
                Err(SequencerError::StoreUnavailable(reason).into())
            }
        }
    }

    async fn commit_per_record(
        &self,
        pages: &[NewPage],
        cancel: &CancellationToken,
    ) -> Result<Vec<PageId>, CommitFailure> {
        let mut inserted: Vec<PageId> = Vec::with_capacity(pages.len());

        for page in pages {
            if cancel.is_cancelled() {
                self.rollback(page_chapter(pages), &inserted, "upload cancelled")
                    .await?;
                return Err(SequencerError::Cancelled.into());
            }

            let result = bounded(
                self.timeout,
                "insert_pages",
                self.store.insert_pages(std::slice::from_ref(page)),
            )
            .await;

            match result {
                Ok(ids) => inserted.extend(ids),
                Err(err @ StoreError::TimedOut { .. }) => {
                    let failure = self
                        .recover_timed_out(std::slice::from_ref(page), &inserted, &err)
                        .await;
                    return Err(failure.into());
                }
                Err(err) => {
                    self.rollback(&page.chapter_id, &inserted, &err.to_string())
                        .await?;
                    return Err(match err {
                        StoreError::UniqueViolation { page_number, .. } => {
                            CommitFailure::Conflict { page_number }
                        }
                        other if inserted.is_empty() => {
                            SequencerError::StoreUnavailable(store_reason(other)).into()
                        }
                        other => SequencerError::PartialFailureRecovered {
                            chapter_id: page.chapter_id.clone(),
                            inserted: inserted.len(),
                            reason: store_reason(other),
                        }
                        .into(),
                    });
                }
            }
        }

        Ok(inserted)
    }

    /// Remove whatever a batch left behind after an insert timed out.
    ///
    /// `in_flight` are the records of the call that timed out, `inserted` the
    /// ids already confirmed. Stored rows matching an in-flight record by
    /// page number and image reference are taken as written by that call.
    /// When the store cannot be read back, the result is `CleanupFailed`.
    async fn recover_timed_out(
        &self,
        in_flight: &[NewPage],
        inserted: &[PageId],
        err: &StoreError,
    ) -> SequencerError {
        let chapter_id = page_chapter(in_flight);
        let reason = err.to_string();

        let stored = match bounded(self.timeout, "list_pages", self.store.list_pages(chapter_id))
            .await
        {
            Ok(stored) => stored,
            Err(list_err) => {
                let orphaned = match self.rollback(chapter_id, inserted, &reason).await {
                    Ok(()) => Vec::new(),
                    Err(SequencerError::CleanupFailed { orphaned, .. }) => orphaned,
                    Err(other) => return other,
                };
                metrics::ROLLBACKS_TOTAL.with_label_values(&["unverified"]).inc();
                error!(
                    chapter_id = %chapter_id,
                    in_flight = in_flight.len(),
                    error = %list_err,
                    "Could not verify pages of a timed-out insert"
                );
                return SequencerError::CleanupFailed {
                    chapter_id: chapter_id.to_string(),
                    orphaned,
                    reason: format!(
                        "{}, then could not read back the chapter: {}",
                        reason, list_err
                    ),
                };
            }
        };

        let landed = stored.into_iter().filter(|p| {
            !inserted.contains(&p.id)
                && in_flight
                    .iter()
                    .any(|np| np.page_number == p.page_number && np.image_ref == p.image_ref)
        });
        let written: Vec<PageId> = inserted.iter().copied().chain(landed.map(|p| p.id)).collect();

        if let Err(cleanup) = self.rollback(chapter_id, &written, &reason).await {
            return cleanup;
        }

        if written.is_empty() {
            SequencerError::StoreUnavailable(reason)
        } else {
            SequencerError::PartialFailureRecovered {
                chapter_id: chapter_id.to_string(),
                inserted: written.len(),
                reason,
            }
        }
    }

    /// Delete pages written by a batch that did not complete.
    async fn rollback(
        &self,
        chapter_id: &str,
        ids: &[PageId],
        cause: &str,
    ) -> Result<(), SequencerError> {
        if ids.is_empty() {
            return Ok(());
        }

        warn!(
            chapter_id = %chapter_id,
            count = ids.len(),
            cause = %cause,
            "Rolling back partially written batch"
        );

        match bounded(self.timeout, "delete_pages", self.store.delete_pages(ids)).await {
            Ok(()) => {
                metrics::ROLLBACKS_TOTAL.with_label_values(&["success"]).inc();
                Ok(())
            }
            Err(err) => {
                metrics::ROLLBACKS_TOTAL.with_label_values(&["failed"]).inc();
                error!(
                    chapter_id = %chapter_id,
                    orphaned = ?ids,
                    error = %err,
                    "Rollback failed, pages left behind"
                );
                Err(SequencerError::CleanupFailed {
                    chapter_id: chapter_id.to_string(),
                    orphaned: ids.to_vec(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Reason text for a store failure, without the `Store unavailable` prefix.
fn store_reason(err: StoreError) -> String {
    match err {
        StoreError::Unavailable(reason) => reason,
        other => other.to_string(),
    }
}

fn page_chapter(pages: &[NewPage]) -> &str {
    pages.first().map(|p| p.chapter_id.as_str()).unwrap_or_default()
}
