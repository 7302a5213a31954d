// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reading side: a named data reader.

use std::cell::Cell;
use std::ffi::CStr;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::connector::{ConnectorShared, EndpointEntry};
use crate::error::Result;
use crate::info::Infos;
use crate::native::{NativeApi, NativeHandle, OwnedNativeString};
use crate::params::MatchedEndpoint;
use crate::sample::Samples;
use crate::status;

/// A data reader obtained from [`Connector::get_input`](crate::Connector::get_input).
///
/// Every call fails with [`Error::Deleted`](crate::Error::Deleted) once the
/// owning connector is closed.
pub struct Input {
    shared: Arc<ConnectorShared>,
    entry: EndpointEntry,
    _not_sync: PhantomData<Cell<()>>,
}

impl Input {
    pub(crate) fn new(shared: Arc<ConnectorShared>, entry: EndpointEntry) -> Self {
        Self {
            shared,
            entry,
            _not_sync: PhantomData,
        }
    }

    /// `Subscriber::DataReader` name.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.shared.api()
    }

    /// Native root handle, checked for liveness.
    pub(crate) fn connector(&self) -> Result<NativeHandle> {
        self.shared.native()
    }

    pub(crate) fn c_name(&self) -> &CStr {
        &self.entry.c_name
    }

    /// Samples available since the last read/take.
    pub(crate) fn sample_count(&self) -> Result<usize> {
        let connector = self.connector()?;
        let mut count = 0.0;
        status::check(
            self.api(),
            self.api().get_sample_count(connector, self.c_name(), &mut count),
        )?;
        Ok(count as usize)
    }

    /// Copy available samples into [`samples`](Self::samples), leaving them
    /// in the reader's queue (later reads report them as `READ`).
    ///
    /// Returns [`Error::NoData`](crate::Error::NoData) when nothing is queued.
    pub fn read(&self) -> Result<()> {
        let connector = self.connector()?;
        status::check(self.api(), self.api().read(connector, self.c_name()))
    }

    /// Move available samples into [`samples`](Self::samples), removing them
    /// from the reader's queue.
    pub fn take(&self) -> Result<()> {
        let connector = self.connector()?;
        status::check(self.api(), self.api().take(connector, self.c_name()))
    }

    /// Release the samples of the last read/take early.
    pub fn return_loan(&self) -> Result<()> {
        let connector = self.connector()?;
        status::check(self.api(), self.api().return_loan(connector, self.c_name()))
    }

    pub fn samples(&self) -> Samples<'_> {
        Samples::new(self)
    }

    pub fn infos(&self) -> Infos<'_> {
        Infos::new(self)
    }

    /// Block until the number of matched writers changes; returns the change.
    pub fn wait_for_publications(&self, timeout_ms: i32) -> Result<i32> {
        self.connector()?;
        let mut change = 0;
        status::check(
            self.api(),
            self.api()
                .wait_for_matched_publication(self.entry.native, timeout_ms, &mut change),
        )?;
        log::debug!("[CONNECTOR] {} publications changed by {}", self.name(), change);
        Ok(change)
    }

    /// Matched writers as the native JSON list.
    pub fn matched_publications_json(&self) -> Result<String> {
        self.connector()?;
        let mut out = None;
        let code = self.api().get_matched_publications(self.entry.native, &mut out);
        let json = OwnedNativeString::new(self.api(), out);
        status::check(self.api(), code)?;
        Ok(json.to_string_lossy())
    }

    pub fn matched_publications(&self) -> Result<Vec<MatchedEndpoint>> {
        MatchedEndpoint::parse_list(&self.matched_publications_json()?)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input").field("name", &self.name()).finish()
    }
}
