// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field access on received samples.
//!
//! Indices are 0-based and checked before any field call: negative indices
//! are rejected without touching the native layer, and indices at or past
//! [`Samples::len`] are rejected after querying the current length.
//!
//! Numeric getters share one path: read the field as `f64`, then narrow
//! (see [`crate::value`]). Compound members (arrays, sequences, nested
//! structs) are read through [`Samples::get_json`] / [`Samples::get_value`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::input::Input;
use crate::native::{c_string, NativeHandle, OwnedNativeString};
use crate::status;
use crate::value::{native_index, Narrow, SampleIndex};

/// View over the samples of the last read/take of an [`Input`].
#[derive(Clone, Copy)]
pub struct Samples<'a> {
    input: &'a Input,
}

/// Turn a native rejection of a by-name access into `FieldNotFound`.
pub(crate) fn field_error(field: &str, err: Error) -> Error {
    match err {
        Error::Native { message, .. } => Error::FieldNotFound {
            field: field.to_string(),
            message,
        },
        other => other,
    }
}

macro_rules! narrowing_getters {
    ($($(#[$meta:meta])* $name:ident -> $t:ty;)*) => {
        $(
            $(#[$meta])*
            pub fn $name<I: SampleIndex>(&self, index: I, field: &str) -> Result<$t> {
                self.get::<I, $t>(index, field)
            }
        )*
    };
}

impl<'a> Samples<'a> {
    pub(crate) fn new(input: &'a Input) -> Self {
        Self { input }
    }

    /// Number of samples since the last read/take (queried each call).
    pub fn len(&self) -> Result<usize> {
        self.input.sample_count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Validate `index` and map it to the native 1-based index.
    fn locate<I: SampleIndex>(&self, index: I) -> Result<(NativeHandle, i32)> {
        let index = index.to_index()?;
        let connector = self.input.connector()?;
        let native = native_index(index, self.input.sample_count()?)?;
        Ok((connector, native))
    }

    /// Field as the raw native `f64`.
    pub fn get_number<I: SampleIndex>(&self, index: I, field: &str) -> Result<f64> {
        let (connector, native) = self.locate(index)?;
        let c_field = c_string(field, "field name")?;
        let api = self.input.api();
        let mut value = 0.0;
        status::check(
            api,
            api.get_number_from_sample(connector, self.input.c_name(), native, &c_field, &mut value),
        )
        .map_err(|e| field_error(field, e))?;
        Ok(value)
    }

    /// Field narrowed to `T`.
    pub fn get<I: SampleIndex, T: Narrow>(&self, index: I, field: &str) -> Result<T> {
        self.get_number(index, field).map(T::narrow)
    }

    narrowing_getters! {
        get_i8 -> i8;
        get_i16 -> i16;
        get_i32 -> i32;
        get_i64 -> i64;
        get_u8 -> u8;
        get_u16 -> u16;
        get_u32 -> u32;
        get_u64 -> u64;
        get_f32 -> f32;
        get_f64 -> f64;
        /// Numeric field as a `char` scalar value.
        get_char -> char;
    }

    pub fn get_bool<I: SampleIndex>(&self, index: I, field: &str) -> Result<bool> {
        let (connector, native) = self.locate(index)?;
        let c_field = c_string(field, "field name")?;
        let api = self.input.api();
        let mut value = 0;
        status::check(
            api,
            api.get_boolean_from_sample(connector, self.input.c_name(), native, &c_field, &mut value),
        )
        .map_err(|e| field_error(field, e))?;
        Ok(value != 0)
    }

    pub fn get_string<I: SampleIndex>(&self, index: I, field: &str) -> Result<String> {
        let (connector, native) = self.locate(index)?;
        let c_field = c_string(field, "field name")?;
        let api = self.input.api();
        let mut out = None;
        let code =
            api.get_string_from_sample(connector, self.input.c_name(), native, &c_field, &mut out);
        let text = OwnedNativeString::new(api, out);
        status::check(api, code).map_err(|e| field_error(field, e))?;
        Ok(text.to_string_lossy())
    }

    /// Whole sample as JSON text.
    pub fn get_json<I: SampleIndex>(&self, index: I) -> Result<String> {
        let (connector, native) = self.locate(index)?;
        let api = self.input.api();
        let mut out = None;
        let code = api.get_json_sample(connector, self.input.c_name(), native, &mut out);
        let json = OwnedNativeString::new(api, out);
        status::check(api, code)?;
        Ok(json.to_string_lossy())
    }

    pub fn get_value<I: SampleIndex>(&self, index: I) -> Result<Value> {
        Ok(serde_json::from_str(&self.get_json(index)?)?)
    }

    /// Whole sample deserialized into `T`.
    pub fn get_typed<I: SampleIndex, T: DeserializeOwned>(&self, index: I) -> Result<T> {
        Ok(serde_json::from_str(&self.get_json(index)?)?)
    }
}

impl std::fmt::Debug for Samples<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Samples")
            .field("input", &self.input.name())
            .finish()
    }
}
