//! Upload-relative path helpers.
//!
//! Attachment records store paths relative to the uploads root with
//! forward slashes on every platform (`2024/03/foo.jpg`). Variant files
//! live in the same directory as the main file and are recorded by
//! basename only.

use crate::defaults::WEBP_EXTENSION;

/// Final path segment (`2024/03/foo.jpg` -> `foo.jpg`).
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Directory part without the trailing slash; empty when the path has
/// no directory.
pub fn directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Resolve a variant basename against the directory of `path`.
pub fn sibling(path: &str, name: &str) -> String {
    let dir = directory(path);
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Swap the extension for `webp`. A basename without an extension gets
/// one appended.
pub fn with_webp_extension(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(idx) => {
            let cut = path.len() - (name.len() - idx);
            format!("{}.{}", &path[..cut], WEBP_EXTENSION)
        }
        None => format!("{}.{}", path, WEBP_EXTENSION),
    }
}
