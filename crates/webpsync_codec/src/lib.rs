//! PHP-serialize codec for WordPress attachment metadata.
//!
//! WordPress persists the attachment metadata bag in a single text column
//! using PHP's `serialize()` format. Every string in that format carries an
//! explicit byte-length prefix (`s:15:"2024/03/foo.jpg";`), so renaming a
//! file inside the bag via plain substring replacement corrupts the
//! prefixes and makes the row unreadable to the platform. The only safe
//! mutation path is a full structural decode, field-level edits on the
//! decoded tree, and a full re-encode that recomputes the lengths.
//!
//! Decode is strict (trailing bytes and unsupported tokens are errors) but
//! failure is recoverable by design: callers treat a malformed bag as
//! absent and leave the column untouched. Everything that is decoded and
//! not explicitly mutated re-encodes byte-for-byte, including floats,
//! which are kept as their raw source text rather than an `f64`.

mod decode;
mod encode;
mod value;

pub use decode::{decode, DecodeError};
pub use encode::encode;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    // A realistic bag: main file, dimensions, one thumbnail, camera data.
    const FIXTURE: &str = concat!(
        "a:5:{s:5:\"width\";i:1600;s:6:\"height\";i:900;",
        "s:4:\"file\";s:15:\"2024/03/foo.jpg\";",
        "s:5:\"sizes\";a:1:{s:9:\"thumbnail\";a:4:{",
        "s:4:\"file\";s:15:\"foo-150x150.jpg\";",
        "s:5:\"width\";i:150;s:6:\"height\";i:150;",
        "s:9:\"mime-type\";s:10:\"image/jpeg\";}}",
        "s:10:\"image_meta\";a:2:{s:8:\"aperture\";d:4.5;s:6:\"camera\";s:6:\"Canon \";}}",
    );

    #[test]
    fn fixture_round_trips_byte_for_byte() {
        let value = decode(FIXTURE).unwrap();
        assert_eq!(encode(&value), FIXTURE);
    }

    #[test]
    fn decode_of_encode_is_identity() {
        let value = decode(FIXTURE).unwrap();
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn fixture_fields_are_reachable() {
        let value = decode(FIXTURE).unwrap();
        assert_eq!(value.get("file").and_then(Value::as_str), Some("2024/03/foo.jpg"));
        assert_eq!(value.get("width").and_then(Value::as_int), Some(1600));
        let thumb = value.get("sizes").and_then(|s| s.get("thumbnail")).unwrap();
        assert_eq!(thumb.get("file").and_then(Value::as_str), Some("foo-150x150.jpg"));
        assert_eq!(thumb.get("mime-type").and_then(Value::as_str), Some("image/jpeg"));
    }

    #[test]
    fn mutating_one_string_recomputes_only_its_prefix() {
        let mut value = decode(FIXTURE).unwrap();
        assert!(value.set("file", Value::Str("2024/03/foo.webp".into())));
        let encoded = encode(&value);
        assert!(encoded.contains("s:16:\"2024/03/foo.webp\";"));
        // Untouched siblings keep their original bytes.
        assert!(encoded.contains("s:15:\"foo-150x150.jpg\";"));
        assert!(encoded.contains("d:4.5;"));
        assert!(encoded.contains("s:6:\"Canon \";"));
    }
}
