//! Entry Module
//!
//! Size accounting and age resolution for individual store entries.

use serde_json::Value;
use tracing::trace;

// == Public Constants ==
/// Bytes charged per UTF-16 code unit of key and value
pub const BYTES_PER_CHAR: u64 = 2;

/// Number of digits in an epoch-millisecond key suffix
const KEY_STAMP_DIGITS: usize = 13;

/// Value fields consulted for an age, first numeric match wins
const VALUE_STAMP_FIELDS: [&str; 3] = ["timestamp", "createdAt", "updatedAt"];

// == Entry ==
/// A key-value pair observed in the store, with derived size and age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    /// Accounted size in bytes
    pub size_bytes: u64,
    /// Resolved age as Unix milliseconds
    pub timestamp_ms: i64,
}

impl Entry {
    // == Constructor ==
    /// Builds an entry, resolving its timestamp.
    ///
    /// `now_ms` is used when neither the key nor the value carries an age,
    /// so such entries look freshly created.
    pub fn resolve(key: impl Into<String>, value: impl Into<String>, now_ms: i64) -> Self {
        let key = key.into();
        let value = value.into();
        let size_bytes = size_bytes(&key, &value);
        let timestamp_ms = timestamp_from_key(&key)
            .or_else(|| timestamp_from_value(&value))
            .unwrap_or(now_ms);

        Self {
            key,
            value,
            size_bytes,
            timestamp_ms,
        }
    }
}

// == Utility Functions ==
/// Returns the accounted size of a key-value pair.
pub fn size_bytes(key: &str, value: &str) -> u64 {
    let units = key.encode_utf16().count() + value.encode_utf16().count();
    units as u64 * BYTES_PER_CHAR
}

/// Reads a `_<13 digits>` epoch-millisecond suffix from the end of a key.
pub fn timestamp_from_key(key: &str) -> Option<i64> {
    let bytes = key.as_bytes();
    if bytes.len() <= KEY_STAMP_DIGITS {
        return None;
    }

    let split = bytes.len() - KEY_STAMP_DIGITS;
    if bytes[split - 1] != b'_' || !bytes[split..].iter().all(u8::is_ascii_digit) {
        return None;
    }

    key[split..].parse().ok()
}

/// Reads a numeric `timestamp`, `createdAt` or `updatedAt` field from a JSON
/// object value.
pub fn timestamp_from_value(value: &str) -> Option<i64> {
    let parsed: Value = match serde_json::from_str(value) {
        Ok(parsed) => parsed,
        Err(err) => {
            trace!("Value is not structured data, no embedded age: {}", err);
            return None;
        }
    };

    let object = parsed.as_object()?;
    VALUE_STAMP_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_size_counts_two_bytes_per_char() {
        assert_eq!(size_bytes("", ""), 0);
        assert_eq!(size_bytes("key", "value"), 16);
    }

    #[test]
    fn test_size_uses_utf16_units() {
        // 'é' is one UTF-16 unit, '😀' is a surrogate pair
        assert_eq!(size_bytes("é", ""), 2);
        assert_eq!(size_bytes("", "😀"), 4);
    }

    #[test]
    fn test_timestamp_from_key_suffix() {
        assert_eq!(
            timestamp_from_key("draft_1699999999999"),
            Some(1_699_999_999_999)
        );
        assert_eq!(timestamp_from_key("_1699999999999"), Some(1_699_999_999_999));
    }

    #[test]
    fn test_timestamp_from_key_rejects_wrong_shapes() {
        // too few digits
        assert_eq!(timestamp_from_key("draft_169999999999"), None);
        // too many digits, no underscore right before the last 13
        assert_eq!(timestamp_from_key("draft_16999999999999"), None);
        // no underscore
        assert_eq!(timestamp_from_key("draft-1699999999999"), None);
        // digits not at the end
        assert_eq!(timestamp_from_key("draft_1699999999999x"), None);
        assert_eq!(timestamp_from_key("1699999999999"), None);
    }

    #[test]
    fn test_timestamp_from_key_with_multibyte_prefix() {
        assert_eq!(timestamp_from_key("é_1699999999999"), Some(1_699_999_999_999));
    }

    #[test]
    fn test_timestamp_from_value_fields_in_order() {
        assert_eq!(timestamp_from_value(r#"{"timestamp": 5, "createdAt": 6}"#), Some(5));
        assert_eq!(timestamp_from_value(r#"{"createdAt": 6, "updatedAt": 7}"#), Some(6));
        assert_eq!(timestamp_from_value(r#"{"updatedAt": 7}"#), Some(7));
        assert_eq!(timestamp_from_value(r#"{"updatedAt": 7.9}"#), Some(7));
    }

    #[test]
    fn test_timestamp_from_value_skips_non_numeric_fields() {
        assert_eq!(
            timestamp_from_value(r#"{"timestamp": "yesterday", "updatedAt": 9}"#),
            Some(9)
        );
    }

    #[test]
    fn test_timestamp_from_value_absent() {
        assert_eq!(timestamp_from_value("plain text"), None);
        assert_eq!(timestamp_from_value(r#"{"other": 1}"#), None);
        assert_eq!(timestamp_from_value("[1, 2, 3]"), None);
        assert_eq!(timestamp_from_value("42"), None);
    }

    #[test]
    fn test_resolve_prefers_key_suffix() {
        let entry = Entry::resolve("chat_1600000000000", r#"{"timestamp": 5}"#, NOW);
        assert_eq!(entry.timestamp_ms, 1_600_000_000_000);
    }

    #[test]
    fn test_resolve_falls_back_to_value_then_now() {
        let entry = Entry::resolve("chat", r#"{"createdAt": 5}"#, NOW);
        assert_eq!(entry.timestamp_ms, 5);

        let entry = Entry::resolve("chat", "{not json", NOW);
        assert_eq!(entry.timestamp_ms, NOW);
        assert_eq!(entry.size_bytes, size_bytes("chat", "{not json"));
    }
}
