//! Upload pipeline: resolve the watermark, assign numbers, commit.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::assign::assign_page_numbers;
use super::committer::{bounded, BatchCommitter, CommitFailure};
use super::turns::{ChapterTurn, TurnRegistry};
use super::{
    ChapterTurns, PhaseObserver, SequencerConfig, SequencerError, SequencerPhase, UploadBatch,
    UploadContext, UploadOutcome,
};
use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics;
use crate::pages::{PageStore, StoreError};

/// Assigns consecutive page numbers to upload batches and commits them.
///
/// Cheap to share behind an `Arc`; every upload runs as an independent
/// invocation. With atomic stores the store's uniqueness constraint is the
/// only serialization point, and a lost race is retried from a fresh
/// watermark up to `max_conflict_retries` times.
pub struct Sequencer {
    store: Arc<dyn PageStore>,
    committer: BatchCommitter,
    config: SequencerConfig,
    turns: Arc<TurnRegistry>,
    audit: Option<AuditHandle>,
    observer: Option<PhaseObserver>,
}

impl Sequencer {
    pub fn new(store: Arc<dyn PageStore>, config: SequencerConfig) -> Self {
        let committer = BatchCommitter::new(Arc::clone(&store), config.store_timeout());
        Self {
            store,
            committer,
            config,
            turns: Arc::new(TurnRegistry::new()),
            audit: None,
            observer: None,
        }
    }

    /// Record upload outcomes in the audit trail.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Report phase transitions to `observer`.
    pub fn with_phase_observer(mut self, observer: PhaseObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    /// Highest committed page number of the chapter, 0 when it has none.
    pub async fn resolve_watermark(&self, chapter_id: &str) -> Result<u32, SequencerError> {
        bounded(
            self.config.store_timeout(),
            "max_page_number",
            self.store.max_page_number(chapter_id),
        )
        .await
        .map(|max| max.unwrap_or(0))
        .map_err(store_unavailable)
    }

    /// Upload a batch of files as the next pages of its chapter.
    pub async fn upload_batch(
        &self,
        ctx: &UploadContext,
        batch: UploadBatch,
    ) -> Result<UploadOutcome, SequencerError> {
        self.upload_batch_cancellable(ctx, batch, &CancellationToken::new())
            .await
    }

    /// Like [`upload_batch`](Self::upload_batch), stopping early once
    /// `cancel` fires. An atomic commit that was already issued completes.
    pub async fn upload_batch_cancellable(
        &self,
        ctx: &UploadContext,
        batch: UploadBatch,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, SequencerError> {
        let started = Instant::now();
        let result = self.run(ctx, &batch, cancel).await;

        let label = match &result {
            Ok(_) => "committed",
            Err(err) => err.kind(),
        };
        metrics::UPLOADS_TOTAL.with_label_values(&[label]).inc();
        metrics::UPLOAD_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                self.notify(&batch.chapter_id, SequencerPhase::Committed);
                metrics::PAGES_COMMITTED.inc_by(outcome.count as u64);
                info!(
                    chapter_id = %outcome.chapter_id,
                    requested_by = %ctx.requested_by,
                    request_id = ?ctx.request_id,
                    start = outcome.start,
                    end = outcome.end,
                    attempts = outcome.attempts,
                    "Committed {} pages",
                    outcome.count
                );
                self.emit(ctx, AuditEvent::PagesCommitted {
                    chapter_id: outcome.chapter_id.clone(),
                    requested_by: ctx.requested_by.clone(),
                    start_page: outcome.start,
                    end_page: outcome.end,
                    count: outcome.count,
                    attempts: outcome.attempts,
                })
                .await;
            }
            Err(err) => {
                self.notify(&batch.chapter_id, SequencerPhase::Failed);
                match err {
                    SequencerError::CleanupFailed { .. } => error!(
                        chapter_id = %batch.chapter_id,
                        requested_by = %ctx.requested_by,
                        request_id = ?ctx.request_id,
                        error = %err,
                        "Upload left orphaned pages"
                    ),
                    _ => warn!(
                        chapter_id = %batch.chapter_id,
                        requested_by = %ctx.requested_by,
                        request_id = ?ctx.request_id,
                        kind = err.kind(),
                        error = %err,
                        "Upload failed"
                    ),
                }
                self.emit(ctx, AuditEvent::UploadFailed {
                    chapter_id: batch.chapter_id.clone(),
                    requested_by: ctx.requested_by.clone(),
                    file_count: batch.len(),
                    error_kind: err.kind().to_string(),
                    message: err.to_string(),
                })
                .await;
            }
        }

        result
    }

    async fn run(
        &self,
        ctx: &UploadContext,
        batch: &UploadBatch,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, SequencerError> {
        if batch.is_empty() {
            return Err(SequencerError::EmptyBatch);
        }
        if batch.len() > self.config.max_batch_size {
            return Err(SequencerError::BatchTooLarge {
                size: batch.len(),
                max: self.config.max_batch_size,
            });
        }

        let chapter_id = batch.chapter_id.as_str();
        let _turn = self.take_turn(chapter_id, cancel).await?;
        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(SequencerError::Cancelled);
            }

            self.notify(chapter_id, SequencerPhase::ResolvingWatermark);
            let watermark = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SequencerError::Cancelled),
                watermark = self.resolve_watermark(chapter_id) => watermark?,
            };

            self.notify(chapter_id, SequencerPhase::Assigning);
            let pages = assign_page_numbers(watermark, batch, &self.config.image_naming)?;

            self.notify(chapter_id, SequencerPhase::Committing);
            match self.committer.commit(&pages, cancel).await {
                Ok(page_ids) => {
                    return Ok(UploadOutcome {
                        chapter_id: chapter_id.to_string(),
                        start: watermark + 1,
                        end: watermark + pages.len() as u32,
                        count: pages.len(),
                        attempts: attempt,
                        page_ids,
                    });
                }
                Err(CommitFailure::Fatal(err)) => return Err(err),
                Err(CommitFailure::Conflict { page_number }) => {
                    if attempt >= max_attempts {
                        return Err(SequencerError::PageNumberConflict {
                            chapter_id: chapter_id.to_string(),
                            attempts: attempt,
                        });
                    }

                    metrics::CONFLICT_RETRIES.inc();
                    warn!(
                        chapter_id = %chapter_id,
                        requested_by = %ctx.requested_by,
                        page_number,
                        attempt,
                        "Page number taken by a concurrent upload, renumbering"
                    );
                    self.notify(chapter_id, SequencerPhase::ConflictRetry);
                    self.emit(ctx, AuditEvent::UploadConflictRetried {
                        chapter_id: chapter_id.to_string(),
                        requested_by: ctx.requested_by.clone(),
                        attempt,
                        page_number,
                    })
                    .await;
                    attempt += 1;
                }
            }
        }
    }

    fn needs_turns(&self) -> bool {
        match self.config.chapter_turns {
            ChapterTurns::Always => true,
            ChapterTurns::Auto => !self.store.atomic_batches(),
        }
    }

    async fn take_turn(
        &self,
        chapter_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ChapterTurn>, SequencerError> {
        if !self.needs_turns() {
            return Ok(None);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SequencerError::Cancelled),
            turn = self.turns.acquire(chapter_id) => Ok(Some(turn)),
        }
    }

    fn notify(&self, chapter_id: &str, phase: SequencerPhase) {
        debug!(chapter_id = %chapter_id, phase = %phase, "Sequencer phase");
        if let Some(ref observer) = self.observer {
            observer(chapter_id, phase);
        }
    }

    async fn emit(&self, ctx: &UploadContext, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit
                .emit_for_request(ctx.request_id.as_deref(), event)
                .await;
        }
    }
}

fn store_unavailable(err: StoreError) -> SequencerError {
    match err {
        StoreError::Unavailable(reason) => SequencerError::StoreUnavailable(reason),
        other => SequencerError::StoreUnavailable(other.to_string()),
    }
}
