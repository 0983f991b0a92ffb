//! Canonical JSON encoding: sorted keys, compact separators, UTF-8.
//!
//! The byte output of [`canonical_bytes`] is the signing preimage for every
//! HMAC in the colony. Any two implementations that disagree on a single byte
//! produce unverifiable signatures, so this writer is deliberately small:
//! objects are emitted with keys in lexicographic (byte) order, arrays in
//! element order, scalars exactly as `serde_json` prints them, and no
//! whitespace anywhere.

use serde_json::Value;

/// Renders `value` in canonical form.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    write_canonical(value, &mut out);
    out
}

/// Renders `value` in canonical form with the top-level signature field
/// removed. This is the verification preimage for signed rows and fragments.
pub fn canonical_bytes_without_sig(value: &Value) -> Vec<u8> {
    match value {
        Value::Object(map) => {
            let mut stripped = map.clone();
            stripped.remove(super::SIG_FIELD);
            canonical_bytes(&Value::Object(stripped))
        }
        other => canonical_bytes(other),
    }
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String((*key).clone()), out);
                out.push(b':');
                write_canonical(&map[*key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

/// Scalars defer to `serde_json` so string escaping and number formatting
/// stay identical to the wire encoding.
fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    // Compact `to_writer` into a Vec cannot fail for scalar values.
    if let Ok(bytes) = serde_json::to_vec(value) {
        out.extend_from_slice(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted() {
        let v = json!({"zeta": 1, "alpha": 2, "mid": {"b": 1, "a": 2}});
        let bytes = canonical_bytes(&v);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"alpha":2,"mid":{"a":2,"b":1},"zeta":1}"#
        );
    }

    #[test]
    fn test_compact_separators_no_whitespace() {
        let v = json!({"a": [1, 2, 3], "b": "x y"});
        let s = String::from_utf8(canonical_bytes(&v)).unwrap();
        assert_eq!(s, r#"{"a":[1,2,3],"b":"x y"}"#);
    }

    #[test]
    fn test_key_order_does_not_change_output() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x":1,"y":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y":2,"x":1}"#).unwrap();
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_sig_field_is_stripped() {
        let signed = json!({"ok": true, "sig": "deadbeef", "ts": 1.5});
        let unsigned = json!({"ok": true, "ts": 1.5});
        assert_eq!(
            canonical_bytes_without_sig(&signed),
            canonical_bytes(&unsigned)
        );
    }

    #[test]
    fn test_unicode_round_trips_as_utf8() {
        let v = json!({"name": "ζωίδιον"});
        let s = String::from_utf8(canonical_bytes(&v)).unwrap();
        assert!(s.contains("ζωίδιον"));
    }
}
