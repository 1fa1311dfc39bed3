//! Page sequencer.
//!
//! Turns an upload batch into consecutive chapter pages:
//! - Watermark: read the chapter's highest page number `W`
//! - Assign: give the files `W+1..=W+N` in submission order
//! - Commit: persist all-or-nothing, renumbering from a fresh watermark when
//!   a concurrent upload claimed the same numbers

mod assign;
mod committer;
mod config;
mod error;
mod runner;
mod turns;
mod types;

pub use assign::{assign_page_numbers, image_ref};
pub use committer::{BatchCommitter, CommitFailure};
pub use config::{ChapterTurns, ImageNaming, SequencerConfig, MAX_CONFLICT_RETRIES};
pub use error::SequencerError;
pub use runner::Sequencer;
pub use turns::{ChapterTurn, TurnRegistry};
pub use types::{PhaseObserver, SequencerPhase, UploadBatch, UploadContext, UploadOutcome};
