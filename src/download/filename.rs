//! Filename construction, sanitization, and collision-free path resolution.
//!
//! Saved documents are named `{identity}_{original_name}`. Both parts come
//! from the remote service, so the combined name is sanitized before it
//! touches the file system and capped to fit a single path component. An
//! existing file is never reused: the resolver tries `name_2.pdf`,
//! `name_3.pdf`, ... until a free name is found.

use std::path::{Component, Path, PathBuf};

/// Name used when sanitization leaves nothing behind.
const FALLBACK_FILENAME: &str = "document.pdf";

/// Extension appended to names that carry none.
const DEFAULT_EXTENSION: &str = ".pdf";

/// First numeric suffix used on collision (`name_2.pdf`).
const FIRST_DUPLICATE_SUFFIX: u64 = 2;

/// Byte budget for a target filename.
///
/// Most file systems reject components over 255 bytes. The remaining 15
/// bytes are left for the `_N` collision suffix.
pub const MAX_FILENAME_BYTES: usize = 240;

/// Longest extension kept when a name is shortened.
const MAX_EXTENSION_BYTES: usize = 12;

/// Builds the desired filename for a document from the signer identity and
/// the document's original name.
///
/// Names longer than [`MAX_FILENAME_BYTES`] are shortened on a character
/// boundary, keeping the extension.
///
/// # Example
///
/// ```
/// use signature_downloader_core::download::build_target_filename;
///
/// assert_eq!(
///     build_target_filename("ana@example.com", "NDA 2024.pdf"),
///     "ana@example.com_NDA 2024.pdf"
/// );
/// assert_eq!(build_target_filename("no_email", "scan"), "no_email_scan.pdf");
/// ```
#[must_use]
pub fn build_target_filename(identity: &str, original_name: &str) -> String {
    let original_name = ensure_extension(original_name.trim());
    let sanitized = sanitize_filename(&format!("{identity}_{original_name}"));
    truncate_filename(&sanitized, MAX_FILENAME_BYTES)
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`, collapses runs of
/// whitespace into a single space, and trims the result.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() && !c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    if is_safe_filename_segment(&collapsed) {
        collapsed
    } else {
        collapsed
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Cuts `name` down to at most `max_bytes`, keeping its extension.
///
/// An extension longer than [`MAX_EXTENSION_BYTES`] is treated as part of
/// the stem and replaced by `.pdf`.
fn truncate_filename(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (stem, ext) = match split_extension(name) {
        (stem, ext) if ext.len() <= MAX_EXTENSION_BYTES => (stem, ext),
        _ => (name, DEFAULT_EXTENSION),
    };
    let mut cut = max_bytes.saturating_sub(ext.len()).min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{ext}", stem[..cut].trim_end())
}

/// Appends `.pdf` when `name` has no extension.
fn ensure_extension(name: &str) -> String {
    if split_extension(name).1.len() > 1 {
        name.to_string()
    } else {
        format!("{}{DEFAULT_EXTENSION}", name.trim_end_matches('.'))
    }
}

/// Splits `name` into stem and extension (including the dot).
///
/// A leading dot does not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

/// Returns a path in `dir` that does not exist yet.
///
/// If `dir/filename` is free it is returned as-is; otherwise `_2`, `_3`, ...
/// is inserted before the extension until an unused name is found. This is a
/// pure query: nothing is created.
#[must_use]
pub fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let base_path = dir.join(filename);
    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = split_extension(filename);
    let mut suffix = FIRST_DUPLICATE_SUFFIX;
    loop {
        let candidate = dir.join(format!("{stem}_{suffix}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
