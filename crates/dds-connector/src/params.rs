// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write parameters, sample states and matched-endpoint descriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::Identity;

/// What a parameterized write does to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
    #[default]
    Write,
    Dispose,
    Unregister,
}

impl WriteAction {
    fn is_write(&self) -> bool {
        *self == WriteAction::Write
    }
}

/// Options for [`Output::write_with_params`](crate::Output::write_with_params).
///
/// ```
/// use dds_connector::{Identity, WriteParams};
///
/// let params = WriteParams::new()
///     .with_source_timestamp(1_234_567_890_000_000)
///     .with_related_sample_identity(Identity::new([1; 16], 3));
/// assert!(params.to_json().unwrap().contains("related_sample_identity"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteParams {
    #[serde(default, skip_serializing_if = "WriteAction::is_write")]
    pub action: WriteAction,
    /// Nanoseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_sample_identity: Option<Identity>,
}

impl WriteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose() -> Self {
        Self::new().with_action(WriteAction::Dispose)
    }

    pub fn unregister() -> Self {
        Self::new().with_action(WriteAction::Unregister)
    }

    pub fn with_action(mut self, action: WriteAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_source_timestamp(mut self, nanos: i64) -> Self {
        self.source_timestamp = Some(nanos);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_related_sample_identity(mut self, identity: Identity) -> Self {
        self.related_sample_identity = Some(identity);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

macro_rules! native_literal_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $lit:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Literal used by the native layer.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $lit),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().trim_matches('"') {
                    $($lit => Ok($name::$variant),)+
                    other => Err(Error::InvalidResponse(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

native_literal_enum! {
    /// Whether the sample was already returned by a previous read.
    SampleState {
        Read => "READ",
        NotRead => "NOT_READ",
    }
}

native_literal_enum! {
    /// Whether this is the first access to the sample's instance.
    ViewState {
        New => "NEW",
        NotNew => "NOT_NEW",
    }
}

native_literal_enum! {
    /// Liveliness of the sample's instance.
    InstanceState {
        Alive => "ALIVE",
        NotAliveDisposed => "NOT_ALIVE_DISPOSED",
        NotAliveNoWriters => "NOT_ALIVE_NO_WRITERS",
    }
}

/// One entry of a matched-publications/subscriptions list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedEndpoint {
    /// Remote endpoint name, absent when the remote side did not publish one.
    #[serde(default)]
    pub name: Option<String>,
}

impl MatchedEndpoint {
    pub(crate) fn parse_list(json: &str) -> Result<Vec<Self>> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidResponse(format!("bad matched list '{}': {}", json, e)))
    }
}
