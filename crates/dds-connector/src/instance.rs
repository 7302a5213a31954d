// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Staging record of an [`Output`].
//!
//! Mutations accumulate until [`Output::write`] publishes them. A rejected
//! set leaves the record as it was.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::native::{c_string, c_text};
use crate::output::Output;
use crate::sample::field_error;
use crate::status;
use crate::value::FieldValue;

#[derive(Clone, Copy)]
pub struct Instance<'a> {
    output: &'a Output,
}

impl<'a> Instance<'a> {
    pub(crate) fn new(output: &'a Output) -> Self {
        Self { output }
    }

    /// Set a scalar member from any [`FieldValue`].
    ///
    /// JSON values must be scalars; compound members go through
    /// [`set_json`](Self::set_json).
    pub fn set(&self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        match value.into() {
            FieldValue::Number(v) => self.set_number(field, v),
            FieldValue::Boolean(v) => self.set_bool(field, v),
            FieldValue::String(v) => self.set_string(field, &v),
            FieldValue::Json(Value::Number(n)) => match n.as_f64() {
                Some(v) => self.set_number(field, v),
                None => Err(Error::InvalidArgument(format!("unrepresentable number {}", n))),
            },
            FieldValue::Json(Value::Bool(v)) => self.set_bool(field, v),
            FieldValue::Json(Value::String(v)) => self.set_string(field, &v),
            FieldValue::Json(other) => Err(Error::InvalidArgument(format!(
                "'{}': compound value {} must be set with set_json",
                field, other
            ))),
        }
    }

    pub fn set_number(&self, field: &str, value: f64) -> Result<()> {
        let connector = self.output.connector()?;
        let c_field = c_string(field, "field name")?;
        let api = self.output.api();
        status::check(
            api,
            api.set_number_into_samples(connector, self.output.c_name(), &c_field, value),
        )
        .map_err(|e| field_error(field, e))
    }

    pub fn set_bool(&self, field: &str, value: bool) -> Result<()> {
        let connector = self.output.connector()?;
        let c_field = c_string(field, "field name")?;
        let api = self.output.api();
        status::check(
            api,
            api.set_boolean_into_samples(connector, self.output.c_name(), &c_field, i32::from(value)),
        )
        .map_err(|e| field_error(field, e))
    }

    pub fn set_string(&self, field: &str, value: &str) -> Result<()> {
        let connector = self.output.connector()?;
        let c_field = c_string(field, "field name")?;
        let c_value = c_text(value, "string value")?;
        let api = self.output.api();
        status::check(
            api,
            api.set_string_into_samples(connector, self.output.c_name(), &c_field, &c_value),
        )
        .map_err(|e| field_error(field, e))
    }

    /// Replace the whole record from JSON text; members not mentioned take
    /// their default value.
    pub fn set_json(&self, json: &str) -> Result<()> {
        let connector = self.output.connector()?;
        let c_json = c_string(json, "JSON")?;
        let api = self.output.api();
        status::check(
            api,
            api.set_json_instance(connector, self.output.c_name(), &c_json),
        )
    }

    pub fn set_value(&self, value: &Value) -> Result<()> {
        self.set_json(&value.to_string())
    }

    /// Replace the whole record with `value` serialized to JSON.
    pub fn set_typed<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.set_json(&serde_json::to_string(value)?)
    }
}

impl std::fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("output", &self.output.name())
            .finish()
    }
}
