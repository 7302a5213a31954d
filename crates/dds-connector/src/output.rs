// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writing side: a named data writer and its staging instance.

use std::cell::Cell;
use std::ffi::CStr;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::connector::{ConnectorShared, EndpointEntry};
use crate::error::Result;
use crate::instance::Instance;
use crate::native::{c_string, NativeApi, NativeHandle, OwnedNativeString};
use crate::params::{MatchedEndpoint, WriteParams};
use crate::status;

/// A data writer obtained from [`Connector::get_output`](crate::Connector::get_output).
///
/// Values are staged through [`instance`](Self::instance) and published by
/// [`write`](Self::write). Every call fails with
/// [`Error::Deleted`](crate::Error::Deleted) once the owning connector is closed.
pub struct Output {
    shared: Arc<ConnectorShared>,
    entry: EndpointEntry,
    _not_sync: PhantomData<Cell<()>>,
}

impl Output {
    pub(crate) fn new(shared: Arc<ConnectorShared>, entry: EndpointEntry) -> Self {
        Self {
            shared,
            entry,
            _not_sync: PhantomData,
        }
    }

    /// `Publisher::DataWriter` name.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.shared.api()
    }

    pub(crate) fn connector(&self) -> Result<NativeHandle> {
        self.shared.native()
    }

    pub(crate) fn c_name(&self) -> &CStr {
        &self.entry.c_name
    }

    /// The staging record published by the next write.
    pub fn instance(&self) -> Instance<'_> {
        Instance::new(self)
    }

    /// Publish the staging record.
    pub fn write(&self) -> Result<()> {
        let connector = self.connector()?;
        status::check(self.api(), self.api().write(connector, self.c_name(), None))
    }

    /// Publish with explicit action, timestamp or identities.
    pub fn write_with_params(&self, params: &WriteParams) -> Result<()> {
        self.write_with_params_json(&params.to_json()?)
    }

    /// Publish with parameters given as JSON
    /// (`{"action":"dispose","source_timestamp":...}`).
    pub fn write_with_params_json(&self, params: &str) -> Result<()> {
        let connector = self.connector()?;
        let c_params = c_string(params, "write parameters")?;
        log::debug!("[CONNECTOR] {} write with params {}", self.name(), params);
        status::check(
            self.api(),
            self.api().write(connector, self.c_name(), Some(&c_params)),
        )
    }

    /// Reset every member of the staging record to its default.
    pub fn clear_members(&self) -> Result<()> {
        let connector = self.connector()?;
        status::check(self.api(), self.api().clear(connector, self.c_name()))
    }

    /// Block until the number of matched readers changes; returns the change.
    pub fn wait_for_subscriptions(&self, timeout_ms: i32) -> Result<i32> {
        self.connector()?;
        let mut change = 0;
        status::check(
            self.api(),
            self.api()
                .wait_for_matched_subscription(self.entry.native, timeout_ms, &mut change),
        )?;
        log::debug!("[CONNECTOR] {} subscriptions changed by {}", self.name(), change);
        Ok(change)
    }

    /// Matched readers as the native JSON list.
    pub fn matched_subscriptions_json(&self) -> Result<String> {
        self.connector()?;
        let mut out = None;
        let code = self.api().get_matched_subscriptions(self.entry.native, &mut out);
        let json = OwnedNativeString::new(self.api(), out);
        status::check(self.api(), code)?;
        Ok(json.to_string_lossy())
    }

    pub fn matched_subscriptions(&self) -> Result<Vec<MatchedEndpoint>> {
        MatchedEndpoint::parse_list(&self.matched_subscriptions_json()?)
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output").field("name", &self.name()).finish()
    }
}
