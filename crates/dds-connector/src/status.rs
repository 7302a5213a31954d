// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native return codes and their mapping onto [`Error`].
//!
//! [`check`] is the only place a raw status is interpreted.

use crate::error::{Error, Result};
use crate::native::{NativeApi, OwnedNativeString};

/// Integer status returned by every native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    pub const OK: Self = Self(0);
    pub const ERROR: Self = Self(1);
    pub const UNSUPPORTED: Self = Self(2);
    pub const BAD_PARAMETER: Self = Self(3);
    pub const PRECONDITION_NOT_MET: Self = Self(4);
    pub const OUT_OF_RESOURCES: Self = Self(5);
    pub const NOT_ENABLED: Self = Self(6);
    pub const IMMUTABLE_POLICY: Self = Self(7);
    pub const INCONSISTENT_POLICY: Self = Self(8);
    pub const ALREADY_DELETED: Self = Self(9);
    pub const TIMEOUT: Self = Self(10);
    pub const NO_DATA: Self = Self(11);
    pub const ILLEGAL_OPERATION: Self = Self(12);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl From<i32> for ReturnCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Map a native status onto the error taxonomy.
///
/// Anything other than OK / NO_DATA / TIMEOUT becomes [`Error::Native`]
/// carrying the native last-error text, released after it is copied.
pub(crate) fn check(api: &dyn NativeApi, code: ReturnCode) -> Result<()> {
    match code {
        ReturnCode::OK => Ok(()),
        ReturnCode::NO_DATA => Err(Error::NoData),
        ReturnCode::TIMEOUT => Err(Error::Timeout),
        ReturnCode(other) => {
            let detail = last_error_text(api);
            let message = if detail.is_empty() {
                format!(
                    "error code {} (no detailed message available from the native layer)",
                    other
                )
            } else {
                detail
            };
            log::debug!("[CONNECTOR] native call failed code={} msg={}", other, message);
            Err(Error::Native {
                code: other,
                message,
            })
        }
    }
}

/// Take the native last-error text, empty when there is none.
pub(crate) fn last_error_text(api: &dyn NativeApi) -> String {
    OwnedNativeString::new(api, api.last_error_message()).to_string_lossy()
}

#[cfg(all(test, feature = "loopback"))]
mod tests {
    use super::*;
    use crate::native::loopback::LoopbackApi;

    #[test]
    fn ok_no_data_timeout_map_to_dedicated_outcomes() {
        let api = LoopbackApi::new();
        assert!(check(&api, ReturnCode::OK).is_ok());
        assert!(check(&api, ReturnCode::NO_DATA).unwrap_err().is_no_data());
        assert!(check(&api, ReturnCode::TIMEOUT).unwrap_err().is_timeout());
    }

    #[test]
    fn other_codes_fall_back_to_generic_message() {
        let api = LoopbackApi::new();
        match check(&api, ReturnCode::PRECONDITION_NOT_MET) {
            Err(Error::Native { code, message }) => {
                assert_eq!(code, 4);
                assert!(message.contains("error code 4"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(api.outstanding_strings(), 0);
    }
}
