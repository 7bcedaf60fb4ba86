//! Edits to the decoded attachment metadata bag.
//!
//! The bag records the main upload-relative path, its pixel dimensions,
//! and a `sizes` array of generated variants, each with a basename and a
//! mime type. Conversion rewrites exactly those fields and leaves every
//! other entry to re-encode byte-for-byte.

use webpsync_codec::Value;
use webpsync_protocol::defaults::WEBP_MIME;
use webpsync_protocol::paths;

/// Distinct variant basenames recorded under `sizes`, in first-seen order.
///
/// Two size labels may point at the same generated file (a crop that
/// happens to match another size pixel-for-pixel); such a file is listed
/// once.
pub fn variant_files(meta: &Value) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    let Some(sizes) = meta.get("sizes").and_then(Value::entries) else {
        return files;
    };
    for (_, record) in sizes {
        if let Some(file) = record.get("file").and_then(Value::as_str) {
            if !files.iter().any(|known| known == file) {
                files.push(file.to_string());
            }
        }
    }
    files
}

/// Rewrite the bag for a converted image.
///
/// Sets the main `file` path, overwrites `width`/`height` when the new
/// values are positive (zero means the probe could not read them), and for
/// every `sizes` entry swaps the basename extension and the mime type.
/// Returns the distinct old→new basename pairs of the variants that
/// actually changed, in first-seen order.
pub fn apply_conversion(
    meta: &mut Value,
    new_main_path: &str,
    width: u32,
    height: u32,
) -> Vec<(String, String)> {
    meta.set("file", Value::Str(new_main_path.to_string()));
    if width > 0 {
        meta.set("width", Value::Int(i64::from(width)));
    }
    if height > 0 {
        meta.set("height", Value::Int(i64::from(height)));
    }

    let mut renamed: Vec<(String, String)> = Vec::new();
    if let Some(sizes) = meta.get_mut("sizes").and_then(Value::entries_mut) {
        for (_, record) in sizes.iter_mut() {
            let Some(old) = record.get("file").and_then(Value::as_str) else {
                continue;
            };
            let old = old.to_string();
            let new = paths::with_webp_extension(&old);
            record.set("file", Value::Str(new.clone()));
            record.set("mime-type", Value::Str(WEBP_MIME.to_string()));
            if old != new && !renamed.iter().any(|(seen, _)| *seen == old) {
                renamed.push((old, new));
            }
        }
    }
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpsync_codec::{decode, encode};

    const BAG: &str = concat!(
        "a:5:{s:5:\"width\";i:1600;s:6:\"height\";i:900;",
        "s:4:\"file\";s:15:\"2024/03/foo.jpg\";",
        "s:5:\"sizes\";a:2:{s:9:\"thumbnail\";a:2:{",
        "s:4:\"file\";s:15:\"foo-150x150.jpg\";",
        "s:9:\"mime-type\";s:10:\"image/jpeg\";}",
        "s:6:\"medium\";a:2:{",
        "s:4:\"file\";s:15:\"foo-300x169.jpg\";",
        "s:9:\"mime-type\";s:10:\"image/jpeg\";}}",
        "s:10:\"image_meta\";a:2:{s:8:\"aperture\";d:4.5;s:6:\"camera\";s:5:\"Canon\";}}",
    );

    #[test]
    fn test_variant_files_lists_distinct_basenames_in_order() {
        let meta = decode(BAG).unwrap();
        assert_eq!(
            variant_files(&meta),
            vec!["foo-150x150.jpg".to_string(), "foo-300x169.jpg".to_string()]
        );
    }

    #[test]
    fn test_variant_files_deduplicates_shared_crops() {
        let meta = Value::Array(vec![(
            Value::Str("sizes".into()),
            Value::Array(vec![
                (
                    Value::Str("thumbnail".into()),
                    Value::Array(vec![(
                        Value::Str("file".into()),
                        Value::Str("foo-150x150.jpg".into()),
                    )]),
                ),
                (
                    Value::Str("small".into()),
                    Value::Array(vec![(
                        Value::Str("file".into()),
                        Value::Str("foo-150x150.jpg".into()),
                    )]),
                ),
            ]),
        )]);
        assert_eq!(variant_files(&meta), vec!["foo-150x150.jpg".to_string()]);
    }

    #[test]
    fn test_variant_files_empty_without_sizes() {
        let meta = decode("a:1:{s:4:\"file\";s:7:\"foo.jpg\";}").unwrap();
        assert!(variant_files(&meta).is_empty());
    }

    #[test]
    fn test_apply_conversion_rewrites_tracked_fields() {
        let mut meta = decode(BAG).unwrap();
        let renamed = apply_conversion(&mut meta, "2024/03/foo.webp", 800, 450);

        assert_eq!(meta.get("file").and_then(Value::as_str), Some("2024/03/foo.webp"));
        assert_eq!(meta.get("width").and_then(Value::as_int), Some(800));
        assert_eq!(meta.get("height").and_then(Value::as_int), Some(450));

        let thumb = meta.get("sizes").and_then(|s| s.get("thumbnail")).unwrap();
        assert_eq!(thumb.get("file").and_then(Value::as_str), Some("foo-150x150.webp"));
        assert_eq!(thumb.get("mime-type").and_then(Value::as_str), Some(WEBP_MIME));

        assert_eq!(
            renamed,
            vec![
                ("foo-150x150.jpg".to_string(), "foo-150x150.webp".to_string()),
                ("foo-300x169.jpg".to_string(), "foo-300x169.webp".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_conversion_keeps_dimensions_when_probe_failed() {
        let mut meta = decode(BAG).unwrap();
        apply_conversion(&mut meta, "2024/03/foo.webp", 0, 0);
        assert_eq!(meta.get("width").and_then(Value::as_int), Some(1600));
        assert_eq!(meta.get("height").and_then(Value::as_int), Some(900));
    }

    #[test]
    fn test_apply_conversion_leaves_untracked_entries_byte_identical() {
        let mut meta = decode(BAG).unwrap();
        apply_conversion(&mut meta, "2024/03/foo.webp", 800, 450);
        let encoded = encode(&meta);
        assert!(encoded.contains("s:16:\"2024/03/foo.webp\";"));
        assert!(encoded.contains("s:16:\"foo-150x150.webp\";"));
        assert!(encoded.contains("d:4.5;"));
        assert!(encoded.contains("s:5:\"Canon\";"));
        assert!(!encoded.contains("image/jpeg"));
    }

    #[test]
    fn test_apply_conversion_skips_already_converted_variants() {
        let mut meta = Value::Array(vec![(
            Value::Str("sizes".into()),
            Value::Array(vec![(
                Value::Str("thumbnail".into()),
                Value::Array(vec![
                    (Value::Str("file".into()), Value::Str("foo-150x150.webp".into())),
                    (Value::Str("mime-type".into()), Value::Str(WEBP_MIME.into())),
                ]),
            )]),
        )]);
        let renamed = apply_conversion(&mut meta, "2024/03/foo.webp", 0, 0);
        assert!(renamed.is_empty());
    }
}
