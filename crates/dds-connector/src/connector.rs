// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The connector: root handle over one native participant.
//!
//! # Lifecycle
//!
//! ```text
//! Connector::new ──> open ──close()/drop──> closed (permanent)
//!                     │
//!                     ├── get_input(name)  ──> Input  ─┐
//!                     └── get_output(name) ──> Output ─┴─ Deleted once closed
//! ```
//!
//! The native root handle lives in an [`AtomicPtr`] shared with every
//! [`Input`] and [`Output`]. Closing swaps it to null and releases whatever
//! was swapped out, so a second close finds nothing to release. Children
//! load the pointer before each call and fail with [`Error::Deleted`] when it
//! is null.
//!
//! # Thread safety
//!
//! Connectors, inputs and outputs can be moved between threads but are not
//! internally synchronized, and are deliberately not `Sync`. Callers that
//! share a connector and its endpoints across threads must serialize every
//! call themselves, e.g. with one `Mutex` around all of them.

use std::cell::RefCell;
use std::ffi::{c_void, CStr};
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crate::config::ConfigSource;
use crate::error::{EntityKind, Error, Result};
use crate::input::Input;
use crate::native::ffi::ConnectorLibrary;
use crate::native::{c_string, NativeApi, NativeHandle};
use crate::output::Output;
use crate::status::{self, last_error_text};

/// State shared by a connector and every endpoint obtained from it.
pub(crate) struct ConnectorShared {
    api: Arc<dyn NativeApi>,
    native: AtomicPtr<c_void>,
    config_name: String,
}

impl ConnectorShared {
    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.api.as_ref()
    }

    /// Native root handle, or [`Error::Deleted`] once closed.
    pub(crate) fn native(&self) -> Result<NativeHandle> {
        NativeHandle::from_raw(self.native.load(Ordering::Acquire)).ok_or(Error::Deleted)
    }

    /// Release the native participant; `false` when already released.
    fn release(&self) -> bool {
        let previous = self.native.swap(ptr::null_mut(), Ordering::AcqRel);
        match NativeHandle::from_raw(previous) {
            Some(handle) => {
                self.api.connector_delete(handle);
                true
            }
            None => false,
        }
    }
}

/// Registered endpoint: name plus the buffer handed to native calls.
#[derive(Clone)]
pub(crate) struct EndpointEntry {
    pub(crate) name: Arc<str>,
    pub(crate) c_name: Arc<CStr>,
    pub(crate) native: NativeHandle,
}

#[derive(Default)]
struct Registry {
    inputs: Vec<EndpointEntry>,
    outputs: Vec<EndpointEntry>,
}

/// Root handle over one native participant.
///
/// ```no_run
/// use dds_connector::Connector;
///
/// let connector = Connector::new("MyParticipantLibrary::Zero", "ShapeExample.xml")?;
/// let output = connector.get_output("MyPublisher::MySquareWriter")?;
/// output.instance().set_number("x", 1.0)?;
/// output.write()?;
/// connector.close()?;
/// # Ok::<(), dds_connector::Error>(())
/// ```
pub struct Connector {
    shared: Arc<ConnectorShared>,
    registry: RefCell<Registry>,
}

impl Connector {
    /// Open `config_name` (`ParticipantLibrary::Participant`) from the XML at
    /// `config_url` using the vendor library (see [`ConnectorLibrary::shared`]).
    pub fn new(config_name: &str, config_url: &str) -> Result<Self> {
        let library = ConnectorLibrary::shared()?;
        Self::with_api(library, config_name, config_url)
    }

    /// Open through an explicit native implementation.
    pub fn with_api(api: Arc<dyn NativeApi>, config_name: &str, config_url: &str) -> Result<Self> {
        ConfigSource::parse(config_url)?;
        let c_config_name = c_string(config_name, "configuration name")?;
        let c_config_url = c_string(config_url, "configuration location")?;

        let Some(native) = api.connector_new(&c_config_name, &c_config_url) else {
            let detail = last_error_text(api.as_ref());
            log::warn!(
                "[CONNECTOR] Failed to create participant {}: {}",
                config_name,
                detail
            );
            return Err(Error::Config(if detail.is_empty() {
                config_name.to_string()
            } else {
                detail
            }));
        };

        log::info!("[CONNECTOR] Participant {} created", config_name);
        Ok(Self {
            shared: Arc::new(ConnectorShared {
                api,
                native: AtomicPtr::new(native.as_raw()),
                config_name: config_name.to_string(),
            }),
            registry: RefCell::new(Registry::default()),
        })
    }

    pub fn config_name(&self) -> &str {
        &self.shared.config_name
    }

    pub fn is_closed(&self) -> bool {
        self.shared.native().is_err()
    }

    /// Release the native participant and every registered endpoint.
    ///
    /// Idempotent: later calls return `Ok(())` without touching the native
    /// layer. Endpoints obtained earlier fail with [`Error::Deleted`] from
    /// now on.
    pub fn close(&self) -> Result<()> {
        // Endpoints keep their own reference to the name buffers; the
        // registry's share is dropped here.
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            registry.inputs.clear();
            registry.outputs.clear();
        }
        if self.shared.release() {
            log::info!("[CONNECTOR] Participant {} deleted", self.shared.config_name);
        }
        Ok(())
    }

    /// Look up a reader by `Subscriber::DataReader` name.
    pub fn get_input(&self, name: &str) -> Result<Input> {
        let entry = self.lookup(name, EntityKind::Input)?;
        Ok(Input::new(Arc::clone(&self.shared), entry))
    }

    /// Look up a writer by `Publisher::DataWriter` name.
    pub fn get_output(&self, name: &str) -> Result<Output> {
        let entry = self.lookup(name, EntityKind::Output)?;
        Ok(Output::new(Arc::clone(&self.shared), entry))
    }

    fn lookup(&self, name: &str, kind: EntityKind) -> Result<EndpointEntry> {
        let native = self.shared.native()?;

        let mut registry = self.registry.borrow_mut();
        let entries = match kind {
            EntityKind::Input => &mut registry.inputs,
            EntityKind::Output => &mut registry.outputs,
        };
        if let Some(entry) = entries.iter().find(|e| &*e.name == name) {
            return Ok(entry.clone());
        }

        let c_name = c_string(name, "entity name")?;
        let api = self.shared.api();
        let found = match kind {
            EntityKind::Input => api.get_datareader(native, &c_name),
            EntityKind::Output => api.get_datawriter(native, &c_name),
        };
        let Some(endpoint) = found else {
            let detail = last_error_text(api);
            log::warn!("[CONNECTOR] {} lookup failed for {}: {}", kind, name, detail);
            return Err(Error::NotFound {
                kind,
                name: name.to_string(),
            });
        };

        log::debug!("[CONNECTOR] {} {} registered", kind, name);
        let entry = EndpointEntry {
            name: Arc::from(name),
            c_name: Arc::from(c_name),
            native: endpoint,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    /// Block until any input of this connector has data, or `timeout_ms`
    /// elapses (`-1` waits forever).
    pub fn wait(&self, timeout_ms: i32) -> Result<()> {
        let native = self.shared.native()?;
        log::debug!("[CONNECTOR] Waiting for data (timeout={}ms)", timeout_ms);
        let api = self.shared.api();
        status::check(api, api.wait_for_data(native, timeout_ms))
    }

    /// Names of inputs looked up so far.
    pub fn inputs(&self) -> Vec<String> {
        self.registry
            .borrow()
            .inputs
            .iter()
            .map(|e| e.name.to_string())
            .collect()
    }

    /// Names of outputs looked up so far.
    pub fn outputs(&self) -> Vec<String> {
        self.registry
            .borrow()
            .outputs
            .iter()
            .map(|e| e.name.to_string())
            .collect()
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("config_name", &self.shared.config_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
