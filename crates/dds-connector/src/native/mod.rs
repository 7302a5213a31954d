// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native boundary.
//!
//! Every call into the middleware goes through [`NativeApi`]. Calls return the
//! raw integer status of the native layer plus out-parameters; turning a status
//! into an [`Error`](crate::Error) is the job of [`crate::status`], nothing
//! else interprets raw codes.
//!
//! # Architecture
//!
//! ```text
//! Connector / Input / Output / Samples / Infos / Instance
//!                         |
//!                   status::check
//!                         |
//!               dyn NativeApi  (this module)
//!                 /                  \
//!   ffi::ConnectorLibrary      loopback::LoopbackApi
//!   (vendor library,           (in-process, tests)
//!    loaded at runtime)
//! ```
//!
//! # String ownership
//!
//! Strings handed *to* the native layer are `&CStr` borrowed from a
//! `CString` owned by the caller for the duration of one call. Strings handed
//! *back* are [`NativeString`]s owned by the native side; wrap them in
//! [`OwnedNativeString`] so they are released exactly once on every path.

pub mod ffi;
#[cfg(feature = "loopback")]
pub mod loopback;

use std::ffi::{c_void, CStr, CString};
use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::status::ReturnCode;

/// Copy `value` into a NUL-terminated buffer for one native call.
///
/// `what` names the argument in the error for empty input or an interior NUL.
pub(crate) fn c_string(value: &str, what: &str) -> Result<CString> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{} cannot be empty", what)));
    }
    c_text(value, what)
}

/// Like [`c_string`] but accepts the empty string (field values).
pub(crate) fn c_text(value: &str, what: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::InvalidArgument(format!("{} contains a NUL byte", what)))
}

/// Opaque handle to a native object (participant, reader or writer).
///
/// The handle is a token: this crate never dereferences it, only passes it
/// back to the [`NativeApi`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(NonNull<c_void>);

// SAFETY: the pointer is an opaque token interpreted only by the native
// layer. Thread-safety of the object behind it is the native layer's
// contract, documented on `Connector`.
unsafe impl Send for NativeHandle {}
// SAFETY: see above.
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    /// Wrap a raw pointer, `None` when null.
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    /// Raw pointer for passing across the boundary.
    pub fn as_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// A NUL-terminated string allocated by the native layer.
///
/// Must be released with [`NativeApi::free_string`] of the API that returned it.
#[derive(Debug)]
pub struct NativeString(NonNull<libc::c_char>);

// SAFETY: the buffer is plain heap memory owned by whoever holds this value.
unsafe impl Send for NativeString {}

impl NativeString {
    /// Wrap a raw pointer, `None` when null.
    pub fn from_raw(raw: *mut libc::c_char) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    /// Raw pointer for passing back across the boundary.
    pub fn as_raw(&self) -> *mut libc::c_char {
        self.0.as_ptr()
    }
}

/// Scoped ownership of a [`NativeString`]: releases it on drop.
pub(crate) struct OwnedNativeString<'a> {
    api: &'a dyn NativeApi,
    raw: Option<NativeString>,
}

impl<'a> OwnedNativeString<'a> {
    pub(crate) fn new(api: &'a dyn NativeApi, raw: Option<NativeString>) -> Self {
        Self { api, raw }
    }

    /// Copy the text out. A null string reads as empty.
    pub(crate) fn to_string_lossy(&self) -> String {
        match &self.raw {
            // SAFETY: `NativeApi` implementors guarantee returned strings are
            // valid NUL-terminated buffers until `free_string` is called,
            // which only happens in `Drop` below.
            Some(raw) => unsafe { CStr::from_ptr(raw.as_raw()) }
                .to_string_lossy()
                .into_owned(),
            None => String::new(),
        }
    }
}

impl Drop for OwnedNativeString<'_> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.api.free_string(raw);
        }
    }
}

/// One method per native entry point.
///
/// Indices are 1-based, as the native layer counts them. Entity names are
/// `Publisher::Writer` / `Subscriber::Reader` strings.
///
/// # Safety
///
/// Implementors must return, through every `NativeString` out-parameter and
/// from [`NativeApi::last_error_message`], either `None` or a pointer to a
/// NUL-terminated buffer that stays valid until it is passed to
/// [`NativeApi::free_string`] on the same implementor.
pub unsafe trait NativeApi: Send + Sync {
    // Lifecycle
    fn connector_new(&self, config_name: &CStr, config_url: &CStr) -> Option<NativeHandle>;
    fn connector_delete(&self, connector: NativeHandle);

    // Lookup
    fn get_datareader(&self, connector: NativeHandle, entity: &CStr) -> Option<NativeHandle>;
    fn get_datawriter(&self, connector: NativeHandle, entity: &CStr) -> Option<NativeHandle>;

    // Data motion
    fn read(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode;
    fn take(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode;
    fn return_loan(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode;
    fn write(&self, connector: NativeHandle, entity: &CStr, params: Option<&CStr>) -> ReturnCode;
    fn clear(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode;

    // Scalar access (read side)
    fn get_number_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut f64,
    ) -> ReturnCode;
    fn get_boolean_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut i32,
    ) -> ReturnCode;
    fn get_string_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut Option<NativeString>,
    ) -> ReturnCode;

    // Scalar access (write side)
    fn set_number_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: f64,
    ) -> ReturnCode;
    fn set_boolean_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: i32,
    ) -> ReturnCode;
    fn set_string_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: &CStr,
    ) -> ReturnCode;

    // Bulk access
    fn get_json_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        out: &mut Option<NativeString>,
    ) -> ReturnCode;
    fn set_json_instance(&self, connector: NativeHandle, entity: &CStr, json: &CStr)
        -> ReturnCode;

    // Metadata access
    fn get_boolean_from_infos(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        member: &CStr,
        out: &mut i32,
    ) -> ReturnCode;
    fn get_json_from_infos(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        member: &CStr,
        out: &mut Option<NativeString>,
    ) -> ReturnCode;

    // Counts
    fn get_sample_count(&self, connector: NativeHandle, entity: &CStr, out: &mut f64)
        -> ReturnCode;

    // Blocking
    fn wait_for_data(&self, connector: NativeHandle, timeout_ms: i32) -> ReturnCode;
    fn wait_for_matched_publication(
        &self,
        reader: NativeHandle,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode;
    fn wait_for_matched_subscription(
        &self,
        writer: NativeHandle,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode;

    // Matching
    fn get_matched_publications(
        &self,
        reader: NativeHandle,
        out: &mut Option<NativeString>,
    ) -> ReturnCode;
    fn get_matched_subscriptions(
        &self,
        writer: NativeHandle,
        out: &mut Option<NativeString>,
    ) -> ReturnCode;

    // Diagnostics and string ownership
    fn last_error_message(&self) -> Option<NativeString>;
    fn free_string(&self, s: NativeString);
}
