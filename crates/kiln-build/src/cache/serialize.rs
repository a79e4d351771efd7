//! Payload envelope.
//!
//! Driver payloads are opaque bytes. The store wraps them with the format
//! version and the owning module so a payload copied or left over from another
//! module or release is detected on load.

use serde::{Deserialize, Serialize};

use super::{CacheError, CacheResult};

/// Current payload format version. Increment when the envelope changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadEnvelope {
    pub format_version: u32,
    pub module_id: String,
    pub bytes: Vec<u8>,
}

impl PayloadEnvelope {
    pub fn new(module_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            module_id: module_id.into(),
            bytes,
        }
    }

    /// Check if this envelope is compatible with current version.
    pub fn is_compatible(&self) -> bool {
        self.format_version == CACHE_FORMAT_VERSION
    }

    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode an envelope and check that it belongs to `module_id`.
    pub fn decode(data: &[u8], module_id: &str) -> CacheResult<Self> {
        let envelope: PayloadEnvelope = bincode::deserialize(data)
            .map_err(|e| CacheError::DeserializationError(e.to_string()))?;
        if !envelope.is_compatible() {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_FORMAT_VERSION,
                found: envelope.format_version,
            });
        }
        if envelope.module_id != module_id {
            return Err(CacheError::Corrupted(format!(
                "payload for '{}' found in the record of '{module_id}'",
                envelope.module_id
            )));
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_foreign_payload() {
        let data = PayloadEnvelope::new("a", vec![1, 2, 3]).encode().unwrap();
        assert_eq!(
            PayloadEnvelope::decode(&data, "a").unwrap().bytes,
            vec![1, 2, 3]
        );
        assert!(matches!(
            PayloadEnvelope::decode(&data, "b"),
            Err(CacheError::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_rejects_other_versions() {
        let mut envelope = PayloadEnvelope::new("a", Vec::new());
        envelope.format_version = CACHE_FORMAT_VERSION + 1;
        let data = envelope.encode().unwrap();
        assert!(matches!(
            PayloadEnvelope::decode(&data, "a"),
            Err(CacheError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            PayloadEnvelope::decode(b"\xff", "a"),
            Err(CacheError::DeserializationError(_))
        ));
    }
}
