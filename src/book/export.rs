//! Plain-text export of an EPUB, one file per chapter.

use std::path::Path;

use super::{html, open_doc, spine_documents, BookError};
use crate::text::safe_filename;

/// Longest title fragment used in an exported file name.
pub const MAX_TITLE_LEN: usize = 80;

/// Write every readable chapter of `epub_path` to `out_dir` as
/// `NNN_<title>.txt` and return how many files were written.
///
/// Existing `.txt` files in `out_dir` are removed first so the directory
/// mirrors the book.
pub fn export_chapters(epub_path: &Path, out_dir: &Path) -> Result<usize, BookError> {
    let mut doc = open_doc(epub_path)?;

    std::fs::create_dir_all(out_dir)?;
    for entry in std::fs::read_dir(out_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            std::fs::remove_file(&path)?;
        }
    }

    let mut written = 0;
    for document in spine_documents(&mut doc) {
        let text = html::clean_chapter_text(&document.html);
        if text.is_empty() {
            continue;
        }

        let fallback = document
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = html::chapter_title(&document.html, &fallback);
        let file_name = format!("{:03}_{}.txt", written + 1, safe_filename(&title, MAX_TITLE_LEN));

        std::fs::write(out_dir.join(&file_name), format!("{text}\n"))?;
        log::debug!("Wrote {}", file_name);
        written += 1;
    }

    if written == 0 {
        return Err(BookError::NoReadableChapters(epub_path.to_path_buf()));
    }

    log::info!("Wrote {} chapter file(s) to {}", written, out_dir.display());
    Ok(written)
}
