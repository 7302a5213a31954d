// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample identity.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Writer GUID plus sequence number; names one published sample.
///
/// Serialized as `{"writer_guid": [16 bytes], "sequence_number": n}`.
/// A reply carries the identity of its request as the related identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Identity {
    pub writer_guid: [u8; 16],
    pub sequence_number: i64,
}

impl Identity {
    /// All-zero GUID, sequence number 0. Reported as the related identity of
    /// samples written without one.
    pub const UNKNOWN: Self = Self {
        writer_guid: [0; 16],
        sequence_number: 0,
    };

    pub fn new(writer_guid: [u8; 16], sequence_number: i64) -> Self {
        Self {
            writer_guid,
            sequence_number,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// Parse the JSON form returned by the native layer.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidResponse(format!("bad identity '{}': {}", json, e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let id = Identity::new([7; 16], 42);
        let json = id.to_json().expect("json");
        assert!(json.contains("\"writer_guid\":[7,7,7"));
        assert!(json.contains("\"sequence_number\":42"));
        assert_eq!(Identity::from_json(&json).expect("parse"), id);
    }

    #[test]
    fn short_guid_is_rejected() {
        let err = Identity::from_json(r#"{"writer_guid":[1,2,3],"sequence_number":1}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn unknown_identity() {
        assert!(Identity::UNKNOWN.is_unknown());
        assert!(!Identity::new([1; 16], 0).is_unknown());
    }
}
