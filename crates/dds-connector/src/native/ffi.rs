// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Vendor connector library, loaded at runtime.
//!
//! The library is opened with `libloading` so that building and testing this
//! crate never needs it at link time. All symbols are resolved once at load;
//! a missing symbol fails the load instead of the first call.

use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::{Arc, OnceLock};

use libc::{c_char, c_double, c_int};
use libloading::Library;

use super::{NativeApi, NativeHandle, NativeString};
use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::status::ReturnCode;

type ConnectorNewFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *const c_void) -> *mut c_void;
type ConnectorDeleteFn = unsafe extern "C" fn(*mut c_void);
type GetEntityFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void;
type EntityOpFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> c_int;
type WriteFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int;
type GetNumberFn =
    unsafe extern "C" fn(*mut c_void, *mut c_double, *const c_char, c_int, *const c_char) -> c_int;
type GetIntFn =
    unsafe extern "C" fn(*mut c_void, *mut c_int, *const c_char, c_int, *const c_char) -> c_int;
type GetStringFn = unsafe extern "C" fn(
    *mut c_void,
    *mut *mut c_char,
    *const c_char,
    c_int,
    *const c_char,
) -> c_int;
type SetNumberFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, c_double) -> c_int;
type SetIntFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, c_int) -> c_int;
type SetStringFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *const c_char) -> c_int;
type GetJsonSampleFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, c_int, *mut *mut c_char) -> c_int;
type SetJsonFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int;
type GetJsonInfosFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    c_int,
    *const c_char,
    *mut *mut c_char,
) -> c_int;
type SampleCountFn = unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_double) -> c_int;
type WaitFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type WaitMatchedFn = unsafe extern "C" fn(*mut c_void, c_int, *mut c_int) -> c_int;
type MatchedFn = unsafe extern "C" fn(*mut c_void, *mut *mut c_char) -> c_int;
type LastErrorFn = unsafe extern "C" fn() -> *mut c_char;
type FreeStringFn = unsafe extern "C" fn(*mut c_char);

struct Symbols {
    connector_new: ConnectorNewFn,
    connector_delete: ConnectorDeleteFn,
    get_datareader: GetEntityFn,
    get_datawriter: GetEntityFn,
    read: EntityOpFn,
    take: EntityOpFn,
    return_loan: EntityOpFn,
    write: WriteFn,
    clear: EntityOpFn,
    get_number_from_sample: GetNumberFn,
    get_boolean_from_sample: GetIntFn,
    get_string_from_sample: GetStringFn,
    set_number_into_samples: SetNumberFn,
    set_boolean_into_samples: SetIntFn,
    set_string_into_samples: SetStringFn,
    get_json_sample: GetJsonSampleFn,
    set_json_instance: SetJsonFn,
    get_boolean_from_infos: GetIntFn,
    get_json_from_infos: GetJsonInfosFn,
    get_sample_count: SampleCountFn,
    wait_for_data: WaitFn,
    wait_for_matched_publication: WaitMatchedFn,
    wait_for_matched_subscription: WaitMatchedFn,
    get_matched_publications: MatchedFn,
    get_matched_subscriptions: MatchedFn,
    get_last_error_message: LastErrorFn,
    free_string: FreeStringFn,
}

/// Resolve one symbol and copy the function pointer out.
///
/// # Safety
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static [u8]) -> Result<T> {
    library.get::<T>(name).map(|sym| *sym).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        Error::Library(format!("missing symbol {}: {}", printable, e))
    })
}

impl Symbols {
    /// # Safety
    /// `library` must be the vendor connector library.
    unsafe fn resolve(library: &Library) -> Result<Self> {
        Ok(Self {
            connector_new: symbol(library, b"RTI_Connector_new\0")?,
            connector_delete: symbol(library, b"RTI_Connector_delete\0")?,
            get_datareader: symbol(library, b"RTI_Connector_get_datareader\0")?,
            get_datawriter: symbol(library, b"RTI_Connector_get_datawriter\0")?,
            read: symbol(library, b"RTI_Connector_read\0")?,
            take: symbol(library, b"RTI_Connector_take\0")?,
            return_loan: symbol(library, b"RTI_Connector_return_loan\0")?,
            write: symbol(library, b"RTI_Connector_write\0")?,
            clear: symbol(library, b"RTI_Connector_clear\0")?,
            get_number_from_sample: symbol(library, b"RTI_Connector_get_number_from_sample\0")?,
            get_boolean_from_sample: symbol(library, b"RTI_Connector_get_boolean_from_sample\0")?,
            get_string_from_sample: symbol(library, b"RTI_Connector_get_string_from_sample\0")?,
            set_number_into_samples: symbol(library, b"RTI_Connector_set_number_into_samples\0")?,
            set_boolean_into_samples: symbol(
                library,
                b"RTI_Connector_set_boolean_into_samples\0",
            )?,
            set_string_into_samples: symbol(library, b"RTI_Connector_set_string_into_samples\0")?,
            get_json_sample: symbol(library, b"RTI_Connector_get_json_sample\0")?,
            set_json_instance: symbol(library, b"RTI_Connector_set_json_instance\0")?,
            get_boolean_from_infos: symbol(library, b"RTI_Connector_get_boolean_from_infos\0")?,
            get_json_from_infos: symbol(library, b"RTI_Connector_get_json_from_infos\0")?,
            get_sample_count: symbol(library, b"RTI_Connector_get_sample_count\0")?,
            wait_for_data: symbol(library, b"RTI_Connector_wait_for_data\0")?,
            wait_for_matched_publication: symbol(
                library,
                b"RTI_Connector_wait_for_matched_publication\0",
            )?,
            wait_for_matched_subscription: symbol(
                library,
                b"RTI_Connector_wait_for_matched_subscription\0",
            )?,
            get_matched_publications: symbol(library, b"RTI_Connector_get_matched_publications\0")?,
            get_matched_subscriptions: symbol(
                library,
                b"RTI_Connector_get_matched_subscriptions\0",
            )?,
            get_last_error_message: symbol(library, b"RTI_Connector_get_last_error_message\0")?,
            free_string: symbol(library, b"RTI_Connector_free_string\0")?,
        })
    }
}

/// The vendor connector library with every entry point resolved.
pub struct ConnectorLibrary {
    symbols: Symbols,
    // Keeps the function pointers in `symbols` valid; dropped last.
    _library: Library,
}

impl std::fmt::Debug for ConnectorLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorLibrary").finish_non_exhaustive()
    }
}

impl ConnectorLibrary {
    /// Open the library at `config.path` and resolve all symbols.
    pub fn load(config: &LibraryConfig) -> Result<Self> {
        log::debug!("[CONNECTOR] Loading native library {}", config.path.display());
        // SAFETY: loading runs the library's initializers; the vendor library
        // has no initialization-order requirements.
        let library = unsafe { Library::new(&config.path) }.map_err(|e| {
            Error::Library(format!("failed to load {}: {}", config.path.display(), e))
        })?;
        // SAFETY: the function pointer types above match the vendor header.
        let symbols = unsafe { Symbols::resolve(&library)? };
        log::info!("[CONNECTOR] Native library loaded from {}", config.path.display());
        Ok(Self {
            symbols,
            _library: library,
        })
    }

    /// Process-wide instance loaded from [`LibraryConfig::from_env`].
    ///
    /// A failed load is not cached; the next call retries.
    pub fn shared() -> Result<Arc<Self>> {
        static LIBRARY: OnceLock<Arc<ConnectorLibrary>> = OnceLock::new();
        if let Some(library) = LIBRARY.get() {
            return Ok(Arc::clone(library));
        }
        let loaded = Arc::new(Self::load(&LibraryConfig::from_env())?);
        Ok(Arc::clone(LIBRARY.get_or_init(|| loaded)))
    }
}

fn take_out(raw: *mut c_char, out: &mut Option<NativeString>) {
    *out = NativeString::from_raw(raw);
}

// SAFETY: every string out-parameter is produced by the vendor library, which
// allocates it on its heap and releases it in `RTI_Connector_free_string`.
unsafe impl NativeApi for ConnectorLibrary {
    fn connector_new(&self, config_name: &CStr, config_url: &CStr) -> Option<NativeHandle> {
        // SAFETY: both strings are NUL-terminated and outlive the call; a null
        // options pointer selects the defaults.
        let raw = unsafe {
            (self.symbols.connector_new)(config_name.as_ptr(), config_url.as_ptr(), ptr::null())
        };
        NativeHandle::from_raw(raw)
    }

    fn connector_delete(&self, connector: NativeHandle) {
        // SAFETY: handle came from `connector_new`; callers release it once.
        unsafe { (self.symbols.connector_delete)(connector.as_raw()) }
    }

    fn get_datareader(&self, connector: NativeHandle, entity: &CStr) -> Option<NativeHandle> {
        // SAFETY: valid handle and NUL-terminated name.
        NativeHandle::from_raw(unsafe {
            (self.symbols.get_datareader)(connector.as_raw(), entity.as_ptr())
        })
    }

    fn get_datawriter(&self, connector: NativeHandle, entity: &CStr) -> Option<NativeHandle> {
        // SAFETY: valid handle and NUL-terminated name.
        NativeHandle::from_raw(unsafe {
            (self.symbols.get_datawriter)(connector.as_raw(), entity.as_ptr())
        })
    }

    fn read(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        // SAFETY: valid handle and NUL-terminated name.
        ReturnCode(unsafe { (self.symbols.read)(connector.as_raw(), entity.as_ptr()) })
    }

    fn take(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        // SAFETY: valid handle and NUL-terminated name.
        ReturnCode(unsafe { (self.symbols.take)(connector.as_raw(), entity.as_ptr()) })
    }

    fn return_loan(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        // SAFETY: valid handle and NUL-terminated name.
        ReturnCode(unsafe { (self.symbols.return_loan)(connector.as_raw(), entity.as_ptr()) })
    }

    fn write(&self, connector: NativeHandle, entity: &CStr, params: Option<&CStr>) -> ReturnCode {
        let params = params.map_or(ptr::null(), CStr::as_ptr);
        // SAFETY: valid handle, NUL-terminated name, params null or NUL-terminated.
        ReturnCode(unsafe { (self.symbols.write)(connector.as_raw(), entity.as_ptr(), params) })
    }

    fn clear(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        // SAFETY: valid handle and NUL-terminated name.
        ReturnCode(unsafe { (self.symbols.clear)(connector.as_raw(), entity.as_ptr()) })
    }

    fn get_number_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut f64,
    ) -> ReturnCode {
        // SAFETY: out points to a live f64; strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.get_number_from_sample)(
                connector.as_raw(),
                out,
                entity.as_ptr(),
                index,
                field.as_ptr(),
            )
        })
    }

    fn get_boolean_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut i32,
    ) -> ReturnCode {
        // SAFETY: out points to a live int; strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.get_boolean_from_sample)(
                connector.as_raw(),
                out,
                entity.as_ptr(),
                index,
                field.as_ptr(),
            )
        })
    }

    fn get_string_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        let mut raw: *mut c_char = ptr::null_mut();
        // SAFETY: raw is a valid out slot; strings NUL-terminated.
        let code = unsafe {
            (self.symbols.get_string_from_sample)(
                connector.as_raw(),
                &mut raw,
                entity.as_ptr(),
                index,
                field.as_ptr(),
            )
        };
        take_out(raw, out);
        ReturnCode(code)
    }

    fn set_number_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: f64,
    ) -> ReturnCode {
        // SAFETY: strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.set_number_into_samples)(
                connector.as_raw(),
                entity.as_ptr(),
                field.as_ptr(),
                value,
            )
        })
    }

    fn set_boolean_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: i32,
    ) -> ReturnCode {
        // SAFETY: strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.set_boolean_into_samples)(
                connector.as_raw(),
                entity.as_ptr(),
                field.as_ptr(),
                value,
            )
        })
    }

    fn set_string_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: &CStr,
    ) -> ReturnCode {
        // SAFETY: strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.set_string_into_samples)(
                connector.as_raw(),
                entity.as_ptr(),
                field.as_ptr(),
                value.as_ptr(),
            )
        })
    }

    fn get_json_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        let mut raw: *mut c_char = ptr::null_mut();
        // SAFETY: raw is a valid out slot; name NUL-terminated.
        let code = unsafe {
            (self.symbols.get_json_sample)(connector.as_raw(), entity.as_ptr(), index, &mut raw)
        };
        take_out(raw, out);
        ReturnCode(code)
    }

    fn set_json_instance(&self, connector: NativeHandle, entity: &CStr, json: &CStr) -> ReturnCode {
        // SAFETY: strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.set_json_instance)(connector.as_raw(), entity.as_ptr(), json.as_ptr())
        })
    }

    fn get_boolean_from_infos(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        member: &CStr,
        out: &mut i32,
    ) -> ReturnCode {
        // SAFETY: out points to a live int; strings NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.get_boolean_from_infos)(
                connector.as_raw(),
                out,
                entity.as_ptr(),
                index,
                member.as_ptr(),
            )
        })
    }

    fn get_json_from_infos(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        member: &CStr,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        let mut raw: *mut c_char = ptr::null_mut();
        // SAFETY: raw is a valid out slot; strings NUL-terminated.
        let code = unsafe {
            (self.symbols.get_json_from_infos)(
                connector.as_raw(),
                entity.as_ptr(),
                index,
                member.as_ptr(),
                &mut raw,
            )
        };
        take_out(raw, out);
        ReturnCode(code)
    }

    fn get_sample_count(&self, connector: NativeHandle, entity: &CStr, out: &mut f64) -> ReturnCode {
        // SAFETY: out points to a live f64; name NUL-terminated.
        ReturnCode(unsafe {
            (self.symbols.get_sample_count)(connector.as_raw(), entity.as_ptr(), out)
        })
    }

    fn wait_for_data(&self, connector: NativeHandle, timeout_ms: i32) -> ReturnCode {
        // SAFETY: valid handle.
        ReturnCode(unsafe { (self.symbols.wait_for_data)(connector.as_raw(), timeout_ms) })
    }

    fn wait_for_matched_publication(
        &self,
        reader: NativeHandle,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode {
        // SAFETY: reader handle from `get_datareader`; out slot is live.
        ReturnCode(unsafe {
            (self.symbols.wait_for_matched_publication)(
                reader.as_raw(),
                timeout_ms,
                current_count_change,
            )
        })
    }

    fn wait_for_matched_subscription(
        &self,
        writer: NativeHandle,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode {
        // SAFETY: writer handle from `get_datawriter`; out slot is live.
        ReturnCode(unsafe {
            (self.symbols.wait_for_matched_subscription)(
                writer.as_raw(),
                timeout_ms,
                current_count_change,
            )
        })
    }

    fn get_matched_publications(
        &self,
        reader: NativeHandle,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        let mut raw: *mut c_char = ptr::null_mut();
        // SAFETY: reader handle from `get_datareader`; out slot is live.
        let code = unsafe { (self.symbols.get_matched_publications)(reader.as_raw(), &mut raw) };
        take_out(raw, out);
        ReturnCode(code)
    }

    fn get_matched_subscriptions(
        &self,
        writer: NativeHandle,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        let mut raw: *mut c_char = ptr::null_mut();
        // SAFETY: writer handle from `get_datawriter`; out slot is live.
        let code = unsafe { (self.symbols.get_matched_subscriptions)(writer.as_raw(), &mut raw) };
        take_out(raw, out);
        ReturnCode(code)
    }

    fn last_error_message(&self) -> Option<NativeString> {
        // SAFETY: no arguments; returns null or a library-owned string.
        NativeString::from_raw(unsafe { (self.symbols.get_last_error_message)() })
    }

    fn free_string(&self, s: NativeString) {
        // SAFETY: `s` was returned by this library and is released once
        // (NativeString is consumed).
        unsafe { (self.symbols.free_string)(s.as_raw()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported_not_panicked() {
        let cfg = LibraryConfig::new("/nonexistent/dir/librtiddsconnector.so");
        match ConnectorLibrary::load(&cfg) {
            Err(Error::Library(msg)) => assert!(msg.contains("/nonexistent/dir")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
