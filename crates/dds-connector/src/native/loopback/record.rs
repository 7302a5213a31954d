// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed JSON records.
//!
//! A record is a `serde_json::Value` object shaped by a [`StructType`]:
//! every member is present, collections are JSON arrays, enums are stored by
//! value. Field paths address members the same way the native layer does:
//!
//! | Path | Meaning |
//! |------|---------|
//! | `x` | top-level member |
//! | `origin.x` | nested struct member |
//! | `points[2].x` | element 2 of an array or sequence |
//! | `points#` | current sequence/array length (read only) |

use serde_json::{Map, Value};

use super::model::{
    Collection, Member, Model, Primitive, StructType, TypeKind, MAX_COLLECTION_LENGTH,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Field(String),
    Index(usize),
    Length,
}

/// Split a field path into segments.
pub(crate) fn parse_path(path: &str) -> Result<Vec<Segment>, String> {
    let (body, length) = match path.strip_suffix('#') {
        Some(body) => (body, true),
        None => (path, false),
    };
    let mut segments = Vec::new();
    for part in body.split('.') {
        let (name, mut tail) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if name.is_empty() {
            return Err(format!("invalid field path '{}'", path));
        }
        segments.push(Segment::Field(name.to_string()));
        while !tail.is_empty() {
            let close = tail
                .find(']')
                .filter(|_| tail.starts_with('['))
                .ok_or_else(|| format!("invalid field path '{}'", path))?;
            let index = tail[1..close]
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid index in field path '{}'", path))?;
            segments.push(Segment::Index(index));
            tail = &tail[close + 1..];
        }
    }
    if length {
        segments.push(Segment::Length);
    }
    Ok(segments)
}

// ============================================================================
// Defaults
// ============================================================================

pub(crate) fn default_record(model: &Model, ty: &StructType) -> Result<Value, String> {
    let mut fields = Map::new();
    for member in &ty.members {
        fields.insert(member.name.clone(), default_member(model, member)?);
    }
    Ok(Value::Object(fields))
}

fn default_member(model: &Model, member: &Member) -> Result<Value, String> {
    match member.collection {
        Collection::Single => default_element(model, &member.kind),
        Collection::Array(len) => {
            let element = default_element(model, &member.kind)?;
            Ok(Value::Array(vec![element; len]))
        }
        Collection::Sequence(_) => Ok(Value::Array(Vec::new())),
    }
}

pub(crate) fn default_element(model: &Model, kind: &TypeKind) -> Result<Value, String> {
    Ok(match kind {
        TypeKind::Primitive(Primitive::Boolean) => Value::Bool(false),
        TypeKind::Primitive(Primitive::Float32 | Primitive::Float64) => Value::from(0.0),
        TypeKind::Primitive(_) => Value::from(0),
        TypeKind::String { .. } => Value::String(String::new()),
        TypeKind::Enum(name) => {
            let e = model
                .enum_type(name)
                .ok_or_else(|| format!("enum '{}' not declared", name))?;
            Value::from(e.enumerators.first().map_or(0, |(_, v)| *v))
        }
        TypeKind::Struct(name) => default_record(model, struct_of(model, name)?)?,
    })
}

fn struct_of<'m>(model: &'m Model, name: &str) -> Result<&'m StructType, String> {
    model
        .struct_type(name)
        .ok_or_else(|| format!("struct '{}' not declared", name))
}

// ============================================================================
// Path access
// ============================================================================

/// What a path resolved to.
#[derive(Debug)]
pub(crate) enum Target<'m, 'v> {
    /// A single element and its type.
    Element(&'m TypeKind, &'v Value),
    /// A whole array or sequence.
    Collection(&'v Value),
    /// Length of an array or sequence.
    Length(usize),
}

fn member_of<'m>(ty: &'m StructType, name: &str) -> Result<&'m Member, String> {
    ty.member(name)
        .ok_or_else(|| format!("member '{}' not found in '{}'", name, ty.name))
}

pub(crate) fn lookup<'m, 'v>(
    model: &'m Model,
    ty: &'m StructType,
    record: &'v Value,
    segments: &[Segment],
) -> Result<Target<'m, 'v>, String> {
    let mut ty = ty;
    let mut current = record;
    let mut i = 0;
    loop {
        let Some(Segment::Field(name)) = segments.get(i) else {
            return Err("expected a member name".to_string());
        };
        i += 1;
        let member = member_of(ty, name)?;
        let mut slot = current
            .get(name.as_str())
            .ok_or_else(|| format!("member '{}' missing from record", name))?;

        match (&member.collection, segments.get(i)) {
            (Collection::Single, None) => return Ok(Target::Element(&member.kind, slot)),
            (Collection::Single, Some(Segment::Field(_))) => {}
            (Collection::Single, Some(_)) => {
                return Err(format!("'{}' is not an array or sequence", name))
            }
            (_, None) => return Ok(Target::Collection(slot)),
            (_, Some(Segment::Length)) if i + 1 == segments.len() => {
                return Ok(Target::Length(slot.as_array().map_or(0, Vec::len)))
            }
            (_, Some(Segment::Index(index))) => {
                i += 1;
                slot = slot
                    .get(*index)
                    .ok_or_else(|| format!("index {} out of bounds for '{}'", index, name))?;
                if i == segments.len() {
                    return Ok(Target::Element(&member.kind, slot));
                }
            }
            (_, Some(_)) => return Err(format!("'{}' needs an index", name)),
        }

        match &member.kind {
            TypeKind::Struct(type_name) => {
                ty = struct_of(model, type_name)?;
                current = slot;
            }
            _ => return Err(format!("'{}' has no members", name)),
        }
    }
}

/// Resolve a path for writing, growing sequences up to their bound.
pub(crate) fn lookup_mut<'m, 'v>(
    model: &'m Model,
    ty: &'m StructType,
    record: &'v mut Value,
    segments: &[Segment],
) -> Result<(&'m TypeKind, &'v mut Value), String> {
    let mut ty = ty;
    let mut current = record;
    let mut i = 0;
    loop {
        let Some(Segment::Field(name)) = segments.get(i) else {
            return Err("expected a member name".to_string());
        };
        i += 1;
        let member = member_of(ty, name)?;
        let mut slot = current
            .get_mut(name.as_str())
            .ok_or_else(|| format!("member '{}' missing from record", name))?;

        match (&member.collection, segments.get(i)) {
            (Collection::Single, None | Some(Segment::Field(_))) => {}
            (Collection::Single, Some(_)) => {
                return Err(format!("'{}' is not an array or sequence", name))
            }
            (Collection::Array(len), Some(Segment::Index(index))) => {
                i += 1;
                if index >= len {
                    return Err(format!("index {} out of bounds for '{}'", index, name));
                }
                slot = slot
                    .get_mut(*index)
                    .ok_or_else(|| format!("index {} out of bounds for '{}'", index, name))?;
            }
            (Collection::Sequence(bound), Some(Segment::Index(index))) => {
                i += 1;
                if bound.is_some_and(|b| *index >= b) {
                    return Err(format!("index {} exceeds the bound of '{}'", index, name));
                }
                if *index >= MAX_COLLECTION_LENGTH {
                    return Err(format!(
                        "index {} exceeds the growth limit {} of '{}'",
                        index, MAX_COLLECTION_LENGTH, name
                    ));
                }
                let items = slot
                    .as_array_mut()
                    .ok_or_else(|| format!("'{}' is not a sequence", name))?;
                while items.len() <= *index {
                    items.push(default_element(model, &member.kind)?);
                }
                slot = &mut items[*index];
            }
            (_, Some(Segment::Length)) => {
                return Err(format!("length of '{}' is read only", name))
            }
            (_, _) => {
                return Err(format!(
                    "'{}' is an array or sequence; address an element or use JSON",
                    name
                ))
            }
        }

        if i == segments.len() {
            return Ok((&member.kind, slot));
        }
        match &member.kind {
            TypeKind::Struct(type_name) => {
                ty = struct_of(model, type_name)?;
                current = slot;
            }
            _ => return Err(format!("'{}' has no members", name)),
        }
    }
}

// ============================================================================
// Scalar conversion
// ============================================================================

fn integer_value(p: Primitive, n: i128) -> Result<Value, String> {
    let (lo, hi) = p
        .int_range()
        .ok_or_else(|| format!("{:?} is not an integer type", p))?;
    if n < lo || n > hi {
        return Err(format!("value {} out of range for {:?}", n, p));
    }
    if p.is_unsigned() {
        Ok(Value::from(n as u64))
    } else {
        Ok(Value::from(n as i64))
    }
}

/// Convert a number for storage in a member of type `kind`.
pub(crate) fn number_value(model: &Model, kind: &TypeKind, v: f64) -> Result<Value, String> {
    if !v.is_finite() {
        return Err(format!("cannot store non-finite number {}", v));
    }
    match kind {
        TypeKind::Primitive(Primitive::Float64) => Ok(Value::from(v)),
        TypeKind::Primitive(Primitive::Float32) => {
            if v.abs() > f64::from(f32::MAX) {
                return Err(format!("value {} out of range for Float32", v));
            }
            Ok(Value::from(f64::from(v as f32)))
        }
        TypeKind::Primitive(Primitive::Boolean) => {
            Err("cannot assign a number to a boolean member".to_string())
        }
        TypeKind::Primitive(p) => integer_value(*p, v.trunc() as i128),
        TypeKind::Enum(name) => {
            let e = model
                .enum_type(name)
                .ok_or_else(|| format!("enum '{}' not declared", name))?;
            let value = v.trunc() as i64;
            e.name_of(value)
                .map(|_| Value::from(value))
                .ok_or_else(|| format!("{} is not a value of enum '{}'", value, name))
        }
        other => Err(format!(
            "cannot assign a number to a {} member",
            other.describe()
        )),
    }
}

pub(crate) fn string_value(model: &Model, kind: &TypeKind, s: &str) -> Result<Value, String> {
    match kind {
        TypeKind::String { max_length } => {
            if let Some(max) = max_length {
                if s.len() > *max {
                    return Err(format!(
                        "string of length {} exceeds the maximum length {}",
                        s.len(),
                        max
                    ));
                }
            }
            Ok(Value::String(s.to_string()))
        }
        TypeKind::Enum(name) => model
            .enum_type(name)
            .and_then(|e| e.value_of(s))
            .map(Value::from)
            .ok_or_else(|| format!("'{}' is not an enumerator of '{}'", s, name)),
        other => Err(format!(
            "cannot assign a string to a {} member",
            other.describe()
        )),
    }
}

pub(crate) fn bool_value(kind: &TypeKind, b: bool) -> Result<Value, String> {
    match kind {
        TypeKind::Primitive(Primitive::Boolean) => Ok(Value::Bool(b)),
        other => Err(format!(
            "cannot assign a boolean to a {} member",
            other.describe()
        )),
    }
}

pub(crate) fn number_of(kind: &TypeKind, value: &Value) -> Result<f64, String> {
    match kind {
        TypeKind::Primitive(Primitive::Boolean) | TypeKind::String { .. } | TypeKind::Struct(_) => {
            Err(format!("a {} member is not a number", kind.describe()))
        }
        _ => value
            .as_f64()
            .ok_or_else(|| "stored value is not a number".to_string()),
    }
}

pub(crate) fn bool_of(kind: &TypeKind, value: &Value) -> Result<bool, String> {
    match kind {
        TypeKind::Primitive(Primitive::Boolean) => value
            .as_bool()
            .ok_or_else(|| "stored value is not a boolean".to_string()),
        other => Err(format!("a {} member is not a boolean", other.describe())),
    }
}

/// Text of any member; non-string members are rendered as JSON.
pub(crate) fn string_of(model: &Model, kind: &TypeKind, value: &Value) -> String {
    match (kind, value) {
        (_, Value::String(s)) => s.clone(),
        (TypeKind::Enum(name), Value::Number(n)) => n
            .as_i64()
            .and_then(|v| model.enum_type(name)?.name_of(v).map(str::to_string))
            .unwrap_or_else(|| n.to_string()),
        (_, other) => other.to_string(),
    }
}

// ============================================================================
// JSON overlay
// ============================================================================

/// Overlay `json` onto `record`, validating every member against `ty`.
pub(crate) fn merge_json(
    model: &Model,
    ty: &StructType,
    record: &mut Value,
    json: &Value,
) -> Result<(), String> {
    let fields = json
        .as_object()
        .ok_or_else(|| format!("expected a JSON object for '{}'", ty.name))?;
    for (name, value) in fields {
        let member = member_of(ty, name)?;
        if value.is_null() {
            continue;
        }
        let slot = record
            .get_mut(name.as_str())
            .ok_or_else(|| format!("member '{}' missing from record", name))?;
        *slot = coerce_member(model, member, value, slot)?;
    }
    Ok(())
}

fn coerce_member(
    model: &Model,
    member: &Member,
    value: &Value,
    base: &Value,
) -> Result<Value, String> {
    match member.collection {
        Collection::Single => coerce_element(model, &member.kind, value, base),
        Collection::Array(len) => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("'{}' expects a JSON array", member.name))?;
            if items.len() > len {
                return Err(format!(
                    "'{}' holds {} elements, got {}",
                    member.name,
                    len,
                    items.len()
                ));
            }
            let mut out = base
                .as_array()
                .cloned()
                .unwrap_or_default();
            for (i, item) in items.iter().enumerate() {
                let current = out.get(i).cloned().unwrap_or(Value::Null);
                let coerced = coerce_element(model, &member.kind, item, &current)?;
                if let Some(slot) = out.get_mut(i) {
                    *slot = coerced;
                }
            }
            Ok(Value::Array(out))
        }
        Collection::Sequence(bound) => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("'{}' expects a JSON array", member.name))?;
            if bound.is_some_and(|b| items.len() > b) {
                return Err(format!(
                    "'{}' is bounded to {} elements, got {}",
                    member.name,
                    bound.unwrap_or_default(),
                    items.len()
                ));
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let fresh = default_element(model, &member.kind)?;
                out.push(coerce_element(model, &member.kind, item, &fresh)?);
            }
            Ok(Value::Array(out))
        }
    }
}

fn coerce_element(
    model: &Model,
    kind: &TypeKind,
    value: &Value,
    base: &Value,
) -> Result<Value, String> {
    match (kind, value) {
        (TypeKind::Primitive(Primitive::Boolean), v) => v
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| format!("expected a boolean, got {}", v)),
        (TypeKind::Primitive(p), Value::Number(n)) if p.int_range().is_some() => {
            if let Some(i) = n.as_i64() {
                integer_value(*p, i128::from(i))
            } else if let Some(u) = n.as_u64() {
                integer_value(*p, i128::from(u))
            } else {
                number_value(model, kind, n.as_f64().unwrap_or(f64::NAN))
            }
        }
        (TypeKind::Primitive(_) | TypeKind::Enum(_), Value::Number(n)) => {
            number_value(model, kind, n.as_f64().unwrap_or(f64::NAN))
        }
        (TypeKind::String { .. } | TypeKind::Enum(_), Value::String(s)) => {
            string_value(model, kind, s)
        }
        (TypeKind::Struct(name), Value::Object(_)) => {
            let ty = struct_of(model, name)?;
            let mut inner = if base.is_object() {
                base.clone()
            } else {
                default_record(model, ty)?
            };
            merge_json(model, ty, &mut inner, value)?;
            Ok(inner)
        }
        (kind, v) => Err(format!("expected a {} value, got {}", kind.describe(), v)),
    }
}

/// Object holding only the key members of `record`.
pub(crate) fn key_of(ty: &StructType, record: &Value) -> Value {
    let mut key = Map::new();
    for member in ty.members.iter().filter(|m| m.key) {
        if let Some(v) = record.get(member.name.as_str()) {
            key.insert(member.name.clone(), v.clone());
        }
    }
    Value::Object(key)
}

/// Default record carrying the key members of `record`.
pub(crate) fn key_only_record(
    model: &Model,
    ty: &StructType,
    record: &Value,
) -> Result<Value, String> {
    let mut out = default_record(model, ty)?;
    if let (Value::Object(fields), Value::Object(keys)) = (&mut out, key_of(ty, record)) {
        fields.extend(keys);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::model;
    use super::*;
    use serde_json::json;

    const XML: &str = r#"
<dds><types>
  <enum name="Color"><enumerator name="RED"/><enumerator name="BLUE"/></enum>
  <struct name="Point"><member name="x" type="long"/><member name="y" type="long"/></struct>
  <struct name="T">
    <member name="id" type="long" key="true"/>
    <member name="s" type="short"/>
    <member name="u" type="unsignedLong"/>
    <member name="f" type="float"/>
    <member name="b" type="boolean"/>
    <member name="st" type="string" stringMaxLength="4"/>
    <member name="color" type="nonBasic" nonBasicTypeName="Color"/>
    <member name="p" type="nonBasic" nonBasicTypeName="Point"/>
    <member name="arr" type="long" arrayDimensions="3"/>
    <member name="seq" type="nonBasic" nonBasicTypeName="Point" sequenceMaxLength="2"/>
    <member name="free" type="long" sequenceMaxLength="-1"/>
  </struct>
</types>
<domain_participant_library name="L"><domain_participant name="P"/></domain_participant_library>
</dds>"#;

    fn fixture() -> model::Model {
        model::load(XML, "L::P").expect("model").0
    }

    fn path(p: &str) -> Vec<Segment> {
        parse_path(p).expect("path")
    }

    #[test]
    fn parses_paths() {
        assert_eq!(
            path("seq[1].x"),
            vec![
                Segment::Field("seq".into()),
                Segment::Index(1),
                Segment::Field("x".into())
            ]
        );
        assert_eq!(
            path("seq#"),
            vec![Segment::Field("seq".into()), Segment::Length]
        );
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a[x]").is_err());
        assert!(parse_path("a[1").is_err());
    }

    #[test]
    fn defaults_cover_every_member() {
        let model = fixture();
        let ty = model.struct_type("T").expect("T");
        let record = default_record(&model, ty).expect("record");
        assert_eq!(record["arr"], json!([0, 0, 0]));
        assert_eq!(record["seq"], json!([]));
        assert_eq!(record["p"], json!({"x": 0, "y": 0}));
        assert_eq!(record["b"], json!(false));
    }

    #[test]
    fn nested_get_and_sequence_growth() {
        let model = fixture();
        let ty = model.struct_type("T").expect("T");
        let mut record = default_record(&model, ty).expect("record");

        let (kind, slot) = lookup_mut(&model, ty, &mut record, &path("seq[1].y")).expect("slot");
        *slot = number_value(&model, kind, 9.0).expect("value");
        assert!(lookup_mut(&model, ty, &mut record, &path("seq[2].y")).is_err());

        match lookup(&model, ty, &record, &path("seq#")).expect("len") {
            Target::Length(n) => assert_eq!(n, 2),
            other => panic!("unexpected {:?}", other),
        }
        match lookup(&model, ty, &record, &path("seq[1].y")).expect("y") {
            Target::Element(kind, v) => assert_eq!(number_of(kind, v).expect("n"), 9.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(lookup(&model, ty, &record, &path("missing")).is_err());
        assert!(lookup(&model, ty, &record, &path("id[0]")).is_err());
    }

    #[test]
    fn unbounded_sequence_growth_is_limited() {
        let model = fixture();
        let ty = model.struct_type("T").expect("T");
        let mut record = default_record(&model, ty).expect("record");

        lookup_mut(&model, ty, &mut record, &path("free[3]")).expect("small growth");
        let far = format!("free[{}]", MAX_COLLECTION_LENGTH);
        assert!(lookup_mut(&model, ty, &mut record, &path(&far)).is_err());
        assert_eq!(record["free"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn scalar_conversion_checks_ranges() {
        let model = fixture();
        let ty = model.struct_type("T").expect("T");
        let short = &ty.member("s").expect("s").kind;
        assert!(number_value(&model, short, 40000.0).is_err());
        assert_eq!(number_value(&model, short, -3.7).expect("v"), json!(-3));

        let unsigned = &ty.member("u").expect("u").kind;
        assert!(number_value(&model, unsigned, -1.0).is_err());

        let st = &ty.member("st").expect("st").kind;
        assert!(string_value(&model, st, "hello").is_err());
        assert!(number_value(&model, st, 1.0).is_err());

        let color = &ty.member("color").expect("color").kind;
        assert_eq!(string_value(&model, color, "BLUE").expect("v"), json!(1));
        assert_eq!(string_of(&model, color, &json!(1)), "BLUE");
        assert!(number_value(&model, color, 7.0).is_err());

        let b = &ty.member("b").expect("b").kind;
        assert!(bool_value(b, true).is_ok());
        assert!(number_of(b, &json!(true)).is_err());
    }

    #[test]
    fn merge_validates_before_returning() {
        let model = fixture();
        let ty = model.struct_type("T").expect("T");
        let mut record = default_record(&model, ty).expect("record");

        merge_json(
            &model,
            ty,
            &mut record,
            &json!({"id": 4, "arr": [1, 2], "seq": [{"x": 1}], "color": "BLUE"}),
        )
        .expect("merge");
        assert_eq!(record["arr"], json!([1, 2, 0]));
        assert_eq!(record["seq"], json!([{"x": 1, "y": 0}]));
        assert_eq!(record["color"], json!(1));

        assert!(merge_json(&model, ty, &mut record.clone(), &json!({"nope": 1})).is_err());
        assert!(merge_json(&model, ty, &mut record.clone(), &json!({"arr": [1, 2, 3, 4]})).is_err());
        assert!(merge_json(&model, ty, &mut record.clone(), &json!({"st": 5})).is_err());
    }

    #[test]
    fn key_only_record_keeps_keys() {
        let model = fixture();
        let ty = model.struct_type("T").expect("T");
        let mut record = default_record(&model, ty).expect("record");
        merge_json(&model, ty, &mut record, &json!({"id": 3, "s": 8})).expect("merge");
        let key = key_only_record(&model, ty, &record).expect("key");
        assert_eq!(key["id"], json!(3));
        assert_eq!(key["s"], json!(0));
        assert_eq!(key_of(ty, &record), json!({"id": 3}));
    }
}
