//! Page number assignment.

use std::path::Path;

use super::{ImageNaming, SequencerError, UploadBatch};
use crate::pages::NewPage;

const DEFAULT_EXTENSION: &str = "jpg";

/// Assign `watermark + 1 ..= watermark + N` to the batch files in order.
///
/// Pure: the same inputs always produce the same records. Empty batches are
/// rejected before any numbers are handed out.
pub fn assign_page_numbers(
    watermark: u32,
    batch: &UploadBatch,
    naming: &ImageNaming,
) -> Result<Vec<NewPage>, SequencerError> {
    if batch.is_empty() {
        return Err(SequencerError::EmptyBatch);
    }

    let overflow = || SequencerError::PageNumberOverflow {
        chapter_id: batch.chapter_id.clone(),
        watermark,
        count: batch.len(),
    };
    let count = u32::try_from(batch.len()).map_err(|_| overflow())?;
    watermark.checked_add(count).ok_or_else(overflow)?;

    Ok(batch
        .files
        .iter()
        .zip(watermark + 1..)
        .map(|(file, page_number)| NewPage {
            chapter_id: batch.chapter_id.clone(),
            page_number,
            image_ref: image_ref(naming, &batch.chapter_id, page_number, file),
        })
        .collect())
}

/// Stored image reference for a file placed at `page_number`.
pub fn image_ref(naming: &ImageNaming, chapter_id: &str, page_number: u32, file: &str) -> String {
    match naming {
        ImageNaming::Passthrough => file.to_string(),
        ImageNaming::Templated { base_url } => format!(
            "{}/chapter-{}-page-{}.{}",
            base_url.trim_end_matches('/'),
            chapter_id,
            page_number,
            extension(file)
        ),
    }
}

fn extension(file: &str) -> String {
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
