//! Canonical CBOR encoding for deterministic frame digests.
//!
//! Implements RFC 8949 Core Deterministic Encoding for the value shapes a
//! frame needs: map keys sorted by encoded byte comparison, integers in the
//! smallest valid encoding, definite lengths only.
//!
//! Two peers holding the same frame must produce identical bytes, and thus
//! identical digests, regardless of platform.

use ciborium::value::Value;

use crate::frame::Frame;
use crate::types::Digest;

/// Domain separator for frame digests.
const FRAME_DOMAIN: &[u8] = b"notesync-frame-v0:";

/// Encode a frame to canonical CBOR bytes.
///
/// The frame becomes a map of `part_id bytes -> [counter, tombstone]`.
pub fn canonical_frame_bytes(frame: &Frame) -> Vec<u8> {
    let entries: Vec<(Value, Value)> = frame
        .iter()
        .map(|(part_id, mark)| {
            (
                Value::Bytes(part_id.0.to_vec()),
                Value::Array(vec![
                    Value::Integer(mark.counter.into()),
                    Value::Bool(mark.tombstone),
                ]),
            )
        })
        .collect();

    let mut buf = Vec::new();
    encode_value_to(&mut buf, &Value::Map(entries));
    buf
}

/// Digest of the canonical frame encoding, domain-separated.
pub fn frame_digest(frame: &Frame) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(FRAME_DOMAIN);
    hasher.update(&canonical_frame_bytes(frame));
    Digest(*hasher.finalize().as_bytes())
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes frames produce are supported.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => {
            let n: i128 = (*i).into();
            // Frame counters are unsigned.
            encode_uint(buf, 0, n as u64);
        }
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => {
            encode_map_canonical(buf, entries);
        }
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
        }
        _ => unreachable!("frame encoding produces only ints, bytes, arrays, maps, bools"),
    }
}

/// Encode an unsigned integer with the given major type, smallest form.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5), keys sorted by encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(key, value)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, key);
            (key_buf, value)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::VersionMark;
    use crate::types::PartId;

    fn pid(b: u8) -> PartId {
        PartId::from_bytes([b; 32])
    }

    #[test]
    fn test_encoding_deterministic() {
        let frame = Frame::from_entries([
            (pid(1), VersionMark::new(1)),
            (pid(2), VersionMark::new(300)),
        ]);

        assert_eq!(canonical_frame_bytes(&frame), canonical_frame_bytes(&frame));
        assert_eq!(frame_digest(&frame), frame_digest(&frame));
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a = Frame::from_entries([
            (pid(2), VersionMark::new(2)),
            (pid(1), VersionMark::new(1)),
        ]);
        let b = Frame::from_entries([
            (pid(1), VersionMark::new(1)),
            (pid(2), VersionMark::new(2)),
        ]);

        assert_eq!(canonical_frame_bytes(&a), canonical_frame_bytes(&b));
    }

    #[test]
    fn test_digest_tracks_marker_changes() {
        let base = Frame::from_entries([(pid(1), VersionMark::new(1))]);
        let advanced = Frame::from_entries([(pid(1), VersionMark::new(2))]);
        let entombed = Frame::from_entries([(pid(1), VersionMark::new(1).entomb())]);

        assert_ne!(frame_digest(&base), frame_digest(&advanced));
        assert_ne!(frame_digest(&base), frame_digest(&entombed));
        assert_ne!(frame_digest(&advanced), frame_digest(&entombed));
    }

    #[test]
    fn test_empty_frame_encoding() {
        let frame = Frame::new();
        // An empty map is a single 0xa0 byte.
        assert_eq!(canonical_frame_bytes(&frame), vec![0xa0]);
    }

    #[test]
    fn test_uint_smallest_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 70_000);
        assert_eq!(buf, vec![0x1a, 0x00, 0x01, 0x11, 0x70]);
    }

    #[test]
    fn test_map_keys_sorted_by_encoded_bytes() {
        let frame = Frame::from_entries([
            (pid(0xcc), VersionMark::new(1)),
            (pid(0x01), VersionMark::new(1)),
        ]);
        let bytes = canonical_frame_bytes(&frame);

        // Map header for two entries, then the 32-byte key for pid(0x01)
        // (byte-string header 0x58 0x20) before pid(0xcc).
        assert_eq!(bytes[0], 0xa2);
        assert_eq!(&bytes[1..3], &[0x58, 0x20]);
        assert_eq!(bytes[3], 0x01);
    }
}
