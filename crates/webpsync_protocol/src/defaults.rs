//! Canonical defaults shared by the CLI and the sync worker.

/// cwebp quality factor (0..=100).
pub const DEFAULT_QUALITY: u8 = 82;

/// Originals below this byte count stay in their source format.
pub const DEFAULT_MIN_SIZE_BYTES: u64 = 10_240;

/// Replacement pairs folded into one UPDATE statement.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Mime type written to repointed attachment rows.
pub const WEBP_MIME: &str = "image/webp";

/// Extension of converted files.
pub const WEBP_EXTENSION: &str = "webp";

/// Source mime types eligible for conversion.
pub const LEGACY_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];
