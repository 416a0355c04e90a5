//! Size Measurement Module
//!
//! Helpers for measuring records. Every size in this crate is an integer
//! number of bytes; limits and size functions must agree on that unit.

use serde::Serialize;

/// 1 kilobyte (decimal)
pub const KB: u64 = 1_000;
/// 1 megabyte (decimal)
pub const MB: u64 = 1_000_000;
/// 1 kibibyte
pub const KIB: u64 = 1024;
/// 1 mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Raw byte length of a record
pub fn byte_len<R: AsRef<[u8]> + ?Sized>(record: &R) -> u64 {
    record.as_ref().len() as u64
}

/// Length of the record once serialized to JSON
///
/// Useful when the downstream system bills on wire size rather than on the
/// in-memory representation. Fails if the value cannot be serialized.
pub fn json_size<R: Serialize + ?Sized>(record: &R) -> Result<u64, serde_json::Error> {
    let encoded = serde_json::to_vec(record)?;
    Ok(encoded.len() as u64)
}

/// Compact serialized size of one line of JSON text
///
/// Whitespace in the source line is not counted. Fails if the line is not
/// valid JSON.
pub fn json_line_size(line: &str) -> Result<u64, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    json_size(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_byte_len_counts_bytes_not_chars() {
        assert_eq!(byte_len("abc"), 3);
        assert_eq!(byte_len("é"), 2);
        assert_eq!(byte_len(&vec![0u8; 512]), 512);
    }

    #[test]
    fn test_json_size_includes_quotes_and_structure() {
        assert_eq!(json_size("abc").unwrap(), 5);

        let mut map = BTreeMap::new();
        map.insert("k", 1);
        // {"k":1}
        assert_eq!(json_size(&map).unwrap(), 7);
    }

    #[test]
    fn test_json_size_fails_on_non_string_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(json_size(&map).is_err());
    }

    #[test]
    fn test_json_line_size_ignores_source_whitespace() {
        assert_eq!(json_line_size(" { \"a\" : 1 } ").unwrap(), 7);
        assert!(json_line_size("not json").is_err());
    }

    #[test]
    fn test_unit_constants() {
        assert_eq!(5 * MIB, 5_242_880);
        assert_eq!(5 * MB, 250 * 20 * KB);
    }
}
