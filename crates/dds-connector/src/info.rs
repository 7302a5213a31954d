// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-sample metadata.
//!
//! Indexed like [`Samples`](crate::Samples). Everything except the validity
//! flag is fetched as a named member in JSON form and then parsed:
//!
//! | Accessor | Member | Parsed as |
//! |----------|--------|-----------|
//! | `source_timestamp` | `source_timestamp` | `i64` nanoseconds |
//! | `reception_timestamp` | `reception_timestamp` | `i64` nanoseconds |
//! | `identity` | `sample_identity` | [`Identity`] |
//! | `related_identity` | `related_sample_identity` | [`Identity`] |
//! | `sample_state` | `sample_state` | [`SampleState`] |
//! | `view_state` | `view_state` | [`ViewState`] |
//! | `instance_state` | `instance_state` | [`InstanceState`] |

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::input::Input;
use crate::native::{c_string, NativeHandle, OwnedNativeString};
use crate::params::{InstanceState, SampleState, ViewState};
use crate::status;
use crate::value::{native_index, SampleIndex};

#[derive(Clone, Copy)]
pub struct Infos<'a> {
    input: &'a Input,
}

impl<'a> Infos<'a> {
    pub(crate) fn new(input: &'a Input) -> Self {
        Self { input }
    }

    /// Same length as the sample view.
    pub fn len(&self) -> Result<usize> {
        self.input.sample_count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn locate<I: SampleIndex>(&self, index: I) -> Result<(NativeHandle, i32)> {
        let index = index.to_index()?;
        let connector = self.input.connector()?;
        let native = native_index(index, self.input.sample_count()?)?;
        Ok((connector, native))
    }

    /// `false` for samples that only carry an instance state change
    /// (dispose, unregister).
    pub fn is_valid<I: SampleIndex>(&self, index: I) -> Result<bool> {
        let (connector, native) = self.locate(index)?;
        let member = c_string("valid_data", "info member")?;
        let api = self.input.api();
        let mut value = 0;
        status::check(
            api,
            api.get_boolean_from_infos(connector, self.input.c_name(), native, &member, &mut value),
        )?;
        Ok(value != 0)
    }

    fn member_json<I: SampleIndex>(&self, index: I, member: &str) -> Result<String> {
        let (connector, native) = self.locate(index)?;
        let c_member = c_string(member, "info member")?;
        let api = self.input.api();
        let mut out = None;
        let code =
            api.get_json_from_infos(connector, self.input.c_name(), native, &c_member, &mut out);
        let json = OwnedNativeString::new(api, out);
        status::check(api, code)?;
        Ok(json.to_string_lossy())
    }

    fn timestamp<I: SampleIndex>(&self, index: I, member: &str) -> Result<i64> {
        let text = self.member_json(index, member)?;
        text.trim()
            .parse()
            .map_err(|_| Error::InvalidResponse(format!("bad {} '{}'", member, text)))
    }

    /// Nanoseconds since the epoch at which the sample was written.
    pub fn source_timestamp<I: SampleIndex>(&self, index: I) -> Result<i64> {
        self.timestamp(index, "source_timestamp")
    }

    /// Nanoseconds since the epoch at which the sample was received.
    pub fn reception_timestamp<I: SampleIndex>(&self, index: I) -> Result<i64> {
        self.timestamp(index, "reception_timestamp")
    }

    pub fn identity<I: SampleIndex>(&self, index: I) -> Result<Identity> {
        Identity::from_json(&self.identity_json(index)?)
    }

    pub fn identity_json<I: SampleIndex>(&self, index: I) -> Result<String> {
        self.member_json(index, "sample_identity")
    }

    /// Identity of the request a reply answers; [`Identity::UNKNOWN`] when
    /// the writer did not set one.
    pub fn related_identity<I: SampleIndex>(&self, index: I) -> Result<Identity> {
        Identity::from_json(&self.related_identity_json(index)?)
    }

    pub fn related_identity_json<I: SampleIndex>(&self, index: I) -> Result<String> {
        self.member_json(index, "related_sample_identity")
    }

    pub fn sample_state<I: SampleIndex>(&self, index: I) -> Result<SampleState> {
        self.member_json(index, "sample_state")?.parse()
    }

    pub fn view_state<I: SampleIndex>(&self, index: I) -> Result<ViewState> {
        self.member_json(index, "view_state")?.parse()
    }

    pub fn instance_state<I: SampleIndex>(&self, index: I) -> Result<InstanceState> {
        self.member_json(index, "instance_state")?.parse()
    }
}

impl std::fmt::Debug for Infos<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Infos")
            .field("input", &self.input.name())
            .finish()
    }
}
