//! CBOR codec for carrying protocol messages over a byte transport.
//!
//! The in-memory transport passes messages directly; transports that move
//! bytes (sockets, relays) use this codec at their edges.

use crate::error::{Result, SyncError};
use crate::messages::SyncMessage;

/// Encode a message to CBOR bytes.
pub fn encode_message(message: &SyncMessage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| SyncError::InvalidMessage(format!("encode: {e}")))?;
    Ok(buf)
}

/// Decode a message from CBOR bytes.
pub fn decode_message(bytes: &[u8]) -> Result<SyncMessage> {
    ciborium::from_reader(bytes).map_err(|e| SyncError::InvalidMessage(format!("decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::{Frame, ItemId, Part, PartId, VersionMark};
    use std::collections::BTreeMap;

    #[test]
    fn test_message_roundtrip() {
        let part_id = PartId::from_bytes([3; 32]);
        let message = SyncMessage::PartsUpload {
            item_id: ItemId::from_bytes([1; 32]),
            frame_delta: Frame::from_entries([(part_id, VersionMark::new(2))]),
            parts: BTreeMap::from([(part_id, Part::new(VersionMark::new(2), &b"payload"[..]))]),
        };

        let bytes = encode_message(&message).unwrap();
        let decoded = decode_message(&bytes).unwrap();

        match decoded {
            SyncMessage::PartsUpload {
                item_id,
                frame_delta,
                parts,
            } => {
                assert_eq!(item_id, message.item_id());
                assert_eq!(frame_delta.get(&part_id), Some(VersionMark::new(2)));
                assert_eq!(parts[&part_id].content.as_ref(), b"payload");
            }
            other => panic!("expected PartsUpload, got {}", other.kind()),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_message(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, SyncError::InvalidMessage(_)));
    }
}
