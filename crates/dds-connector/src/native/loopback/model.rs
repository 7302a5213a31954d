// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XML application model.
//!
//! Reads the subset of the XML application-creation format the loopback
//! layer needs: type declarations, domains with their topics, and one
//! participant with its writers and readers.
//!
//! ```xml
//! <dds>
//!   <types>
//!     <struct name="Shape">
//!       <member name="color" type="string" stringMaxLength="128" key="true"/>
//!       <member name="x" type="long"/>
//!     </struct>
//!   </types>
//!   <domain_library name="MyDomainLibrary">
//!     <domain name="MyDomain" domain_id="0">
//!       <register_type name="Shape" type_ref="Shape"/>
//!       <topic name="Square" register_type_ref="Shape"/>
//!     </domain>
//!   </domain_library>
//!   <domain_participant_library name="MyParticipantLibrary">
//!     <domain_participant name="Zero" domain_ref="MyDomainLibrary::MyDomain">
//!       <publisher name="MyPublisher">
//!         <data_writer name="MyWriter" topic_ref="Square"/>
//!       </publisher>
//!     </domain_participant>
//!   </domain_participant_library>
//! </dds>
//! ```

use std::collections::HashMap;

use roxmltree::{Document, Node};

/// Largest element count of one array member, and the limit up to which
/// `seq[i]` grows a sequence.
pub(crate) const MAX_COLLECTION_LENGTH: usize = 1 << 16;

/// Largest number of leaf values in a default record of one struct type.
const MAX_RECORD_ELEMENTS: usize = 1 << 20;

/// Primitive member types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Primitive {
    Boolean,
    Octet,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl Primitive {
    fn from_xml(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => Self::Boolean,
            "octet" | "byte" => Self::Octet,
            "char" | "char8" | "wchar" => Self::Char,
            "int8" => Self::Int8,
            "uint8" => Self::UInt8,
            "short" | "int16" => Self::Int16,
            "unsignedShort" | "uint16" => Self::UInt16,
            "long" | "int32" => Self::Int32,
            "unsignedLong" | "uint32" => Self::UInt32,
            "longLong" | "int64" => Self::Int64,
            "unsignedLongLong" | "uint64" => Self::UInt64,
            "float" | "float32" => Self::Float32,
            "double" | "float64" | "longDouble" => Self::Float64,
            _ => return None,
        })
    }

    /// Inclusive value range of integer types, `None` otherwise.
    pub(crate) fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Self::Octet | Self::UInt8 | Self::Char => (0, i128::from(u8::MAX)),
            Self::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::UInt16 => (0, i128::from(u16::MAX)),
            Self::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::UInt32 => (0, i128::from(u32::MAX)),
            Self::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::UInt64 => (0, i128::from(u64::MAX)),
            Self::Boolean | Self::Float32 | Self::Float64 => return None,
        })
    }

    pub(crate) fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::Octet | Self::UInt8 | Self::Char | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }
}

/// Element type of a member.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TypeKind {
    Primitive(Primitive),
    String { max_length: Option<usize> },
    Enum(String),
    Struct(String),
}

impl TypeKind {
    pub(crate) fn describe(&self) -> &str {
        match self {
            Self::Primitive(Primitive::Boolean) => "boolean",
            Self::Primitive(_) => "numeric",
            Self::String { .. } => "string",
            Self::Enum(name) | Self::Struct(name) => name,
        }
    }
}

/// How many elements a member holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Collection {
    Single,
    /// Fixed length; multi-dimensional arrays are flattened.
    Array(usize),
    /// Variable length with an optional bound.
    Sequence(Option<usize>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Member {
    pub name: String,
    pub kind: TypeKind,
    pub collection: Collection,
    pub key: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StructType {
    pub name: String,
    pub members: Vec<Member>,
}

impl StructType {
    pub(crate) fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnumType {
    pub name: String,
    pub enumerators: Vec<(String, i64)>,
}

impl EnumType {
    pub(crate) fn value_of(&self, name: &str) -> Option<i64> {
        self.enumerators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub(crate) fn name_of(&self, value: i64) -> Option<&str> {
        self.enumerators
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

/// All declared types, keyed by fully qualified name (`Module::Type`).
#[derive(Debug, Default)]
pub(crate) struct Model {
    structs: HashMap<String, StructType>,
    enums: HashMap<String, EnumType>,
}

impl Model {
    pub(crate) fn struct_type(&self, name: &str) -> Option<&StructType> {
        self.structs.get(name)
    }

    pub(crate) fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }
}

/// A writer or reader declared by the participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndpointDef {
    /// `Publisher::Writer` or `Subscriber::Reader`.
    pub name: String,
    pub topic: String,
    pub type_name: String,
}

/// The participant selected by the configuration name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParticipantDef {
    pub domain_id: i32,
    pub writers: Vec<EndpointDef>,
    pub readers: Vec<EndpointDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decl {
    Struct,
    Enum,
}

/// Parse `xml` and select the participant `config_name`
/// (`ParticipantLibrary::Participant`).
pub(crate) fn load(xml: &str, config_name: &str) -> Result<(Model, ParticipantDef), String> {
    let doc = Document::parse(xml).map_err(|e| format!("failed to parse XML: {}", e))?;
    let root = doc.root_element();

    let mut decls = HashMap::new();
    for types in elements_named(root, "types") {
        collect_decls(types, "", &mut decls);
    }

    let mut model = Model::default();
    for types in elements_named(root, "types") {
        parse_types(types, "", &decls, &mut model)?;
    }
    check_record_sizes(&model)?;

    let domains = parse_domains(root, &model)?;
    let participant = parse_participant(root, config_name, &domains, &model)?;
    Ok((model, participant))
}

fn elements_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn required<'a>(node: Node<'a, '_>, attr: &str) -> Result<&'a str, String> {
    node.attribute(attr).ok_or_else(|| {
        format!(
            "<{}> is missing attribute '{}'",
            node.tag_name().name(),
            attr
        )
    })
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", scope, name)
    }
}

fn collect_decls(node: Node<'_, '_>, scope: &str, decls: &mut HashMap<String, Decl>) {
    for child in child_elements(node) {
        let Some(name) = child.attribute("name") else {
            continue;
        };
        match child.tag_name().name() {
            "struct" => {
                decls.insert(qualify(scope, name), Decl::Struct);
            }
            "enum" => {
                decls.insert(qualify(scope, name), Decl::Enum);
            }
            "module" => collect_decls(child, &qualify(scope, name), decls),
            _ => {}
        }
    }
}

/// Resolve a type reference from inside `scope`, innermost scope first.
fn resolve_name(
    scope: &str,
    name: &str,
    decls: &HashMap<String, Decl>,
) -> Option<(String, Decl)> {
    if let Some(absolute) = name.strip_prefix("::") {
        return decls.get(absolute).map(|d| (absolute.to_string(), *d));
    }
    let mut current = scope.to_string();
    loop {
        let candidate = qualify(&current, name);
        if let Some(decl) = decls.get(&candidate) {
            return Some((candidate, *decl));
        }
        if current.is_empty() {
            return None;
        }
        current = match current.rfind("::") {
            Some(pos) => current[..pos].to_string(),
            None => String::new(),
        };
    }
}

fn parse_types(
    node: Node<'_, '_>,
    scope: &str,
    decls: &HashMap<String, Decl>,
    model: &mut Model,
) -> Result<(), String> {
    for child in child_elements(node) {
        match child.tag_name().name() {
            "module" => {
                let name = required(child, "name")?;
                parse_types(child, &qualify(scope, name), decls, model)?;
            }
            "enum" => {
                let name = qualify(scope, required(child, "name")?);
                let mut enumerators = Vec::new();
                let mut next = 0i64;
                for e in child_elements(child).filter(|n| n.tag_name().name() == "enumerator") {
                    let value = match e.attribute("value") {
                        Some(v) => v
                            .trim()
                            .parse::<i64>()
                            .map_err(|_| format!("invalid enumerator value '{}'", v))?,
                        None => next,
                    };
                    enumerators.push((required(e, "name")?.to_string(), value));
                    next = value + 1;
                }
                model.enums.insert(name.clone(), EnumType { name, enumerators });
            }
            "struct" => {
                let name = qualify(scope, required(child, "name")?);
                let mut members = Vec::new();
                if let Some(base) = child.attribute("baseType") {
                    let base_type = resolve_name(scope, base, decls)
                        .and_then(|(qualified, _)| model.structs.get(&qualified))
                        .ok_or_else(|| format!("base type '{}' of '{}' not declared before it", base, name))?;
                    members.extend(base_type.members.iter().cloned());
                }
                for m in child_elements(child).filter(|n| n.tag_name().name() == "member") {
                    members.push(parse_member(m, scope, decls)?);
                }
                model.structs.insert(name.clone(), StructType { name, members });
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_bound(node: Node<'_, '_>, attr: &str) -> Result<Option<usize>, String> {
    match node.attribute(attr) {
        None => Ok(None),
        Some(v) if v.trim() == "-1" || v.trim() == "unbounded" => Ok(None),
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("invalid {} '{}'", attr, v)),
    }
}

fn parse_member(
    node: Node<'_, '_>,
    scope: &str,
    decls: &HashMap<String, Decl>,
) -> Result<Member, String> {
    let name = required(node, "name")?.to_string();
    let type_name = required(node, "type")?;

    let kind = if type_name == "string" || type_name == "wstring" {
        TypeKind::String {
            max_length: parse_bound(node, "stringMaxLength")?,
        }
    } else if let Some(p) = Primitive::from_xml(type_name) {
        TypeKind::Primitive(p)
    } else {
        let referenced = if type_name == "nonBasic" {
            required(node, "nonBasicTypeName")?
        } else {
            type_name
        };
        match resolve_name(scope, referenced, decls) {
            Some((qualified, Decl::Struct)) => TypeKind::Struct(qualified),
            Some((qualified, Decl::Enum)) => TypeKind::Enum(qualified),
            None => {
                return Err(format!(
                    "member '{}' has unsupported or undeclared type '{}'",
                    name, referenced
                ))
            }
        }
    };

    let collection = match (node.attribute("arrayDimensions"), node.attribute("sequenceMaxLength")) {
        (Some(_), Some(_)) => {
            return Err(format!(
                "member '{}': arrays of sequences are not supported",
                name
            ))
        }
        (Some(dims), None) => {
            let mut total = 1usize;
            for d in dims.split(',') {
                let d = d
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("invalid arrayDimensions '{}'", dims))?;
                total = total
                    .checked_mul(d)
                    .filter(|t| *t <= MAX_COLLECTION_LENGTH)
                    .ok_or_else(|| {
                        format!(
                            "member '{}': arrayDimensions '{}' exceeds {} elements",
                            name, dims, MAX_COLLECTION_LENGTH
                        )
                    })?;
            }
            Collection::Array(total)
        }
        (None, Some(_)) => Collection::Sequence(parse_bound(node, "sequenceMaxLength")?),
        (None, None) => Collection::Single,
    };

    let key = matches!(node.attribute("key"), Some("true" | "1"));
    Ok(Member {
        name,
        kind,
        collection,
        key,
    })
}

/// Reject struct types whose default record would be too large or infinite.
fn check_record_sizes(model: &Model) -> Result<(), String> {
    let mut sizes = HashMap::new();
    for name in model.structs.keys() {
        record_size(model, name, &mut sizes, &mut Vec::new())?;
    }
    Ok(())
}

fn record_size(
    model: &Model,
    name: &str,
    sizes: &mut HashMap<String, usize>,
    visiting: &mut Vec<String>,
) -> Result<usize, String> {
    if let Some(size) = sizes.get(name) {
        return Ok(*size);
    }
    if visiting.iter().any(|v| v == name) {
        return Err(format!("struct '{}' contains itself", name));
    }
    let ty = model
        .struct_type(name)
        .ok_or_else(|| format!("struct '{}' not declared", name))?;
    visiting.push(name.to_string());
    let mut total = 0usize;
    for member in &ty.members {
        let count = match member.collection {
            Collection::Single => 1,
            Collection::Array(len) => len,
            // Sequences start empty.
            Collection::Sequence(_) => {
                total = total.saturating_add(1);
                continue;
            }
        };
        let element = match &member.kind {
            TypeKind::Struct(inner) => record_size(model, inner, sizes, visiting)?.max(1),
            _ => 1,
        };
        total = count
            .checked_mul(element)
            .and_then(|n| total.checked_add(n))
            .filter(|t| *t <= MAX_RECORD_ELEMENTS)
            .ok_or_else(|| {
                format!(
                    "struct '{}' exceeds {} elements by default",
                    name, MAX_RECORD_ELEMENTS
                )
            })?;
    }
    visiting.pop();
    sizes.insert(name.to_string(), total);
    Ok(total)
}

#[derive(Debug, Default)]
struct DomainDef {
    domain_id: i32,
    /// topic name -> struct type name
    topics: HashMap<String, String>,
}

/// Read `register_type` and `topic` children of `node` into `domain`.
fn parse_topics(node: Node<'_, '_>, model: &Model, domain: &mut DomainDef) -> Result<(), String> {
    let mut registered = HashMap::new();
    for reg in child_elements(node).filter(|n| n.tag_name().name() == "register_type") {
        let name = required(reg, "name")?;
        let type_ref = reg.attribute("type_ref").unwrap_or(name);
        let type_ref = type_ref.strip_prefix("::").unwrap_or(type_ref);
        if model.struct_type(type_ref).is_none() {
            return Err(format!("register_type '{}' references unknown type '{}'", name, type_ref));
        }
        registered.insert(name.to_string(), type_ref.to_string());
    }
    for topic in child_elements(node).filter(|n| n.tag_name().name() == "topic") {
        let name = required(topic, "name")?;
        let reg = required(topic, "register_type_ref")?;
        let type_name = registered
            .get(reg)
            .cloned()
            .or_else(|| model.struct_type(reg).map(|s| s.name.clone()))
            .ok_or_else(|| format!("topic '{}' references unknown type '{}'", name, reg))?;
        domain.topics.insert(name.to_string(), type_name);
    }
    Ok(())
}

fn parse_domains(root: Node<'_, '_>, model: &Model) -> Result<HashMap<String, DomainDef>, String> {
    let mut domains = HashMap::new();
    for library in elements_named(root, "domain_library") {
        let library_name = required(library, "name")?;
        for domain in child_elements(library).filter(|n| n.tag_name().name() == "domain") {
            let mut def = DomainDef {
                domain_id: parse_domain_id(domain)?,
                ..DomainDef::default()
            };
            parse_topics(domain, model, &mut def)?;
            domains.insert(qualify(library_name, required(domain, "name")?), def);
        }
    }
    Ok(domains)
}

fn parse_domain_id(node: Node<'_, '_>) -> Result<i32, String> {
    match node.attribute("domain_id") {
        None => Ok(0),
        Some(v) => v
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid domain_id '{}'", v)),
    }
}

fn parse_participant(
    root: Node<'_, '_>,
    config_name: &str,
    domains: &HashMap<String, DomainDef>,
    model: &Model,
) -> Result<ParticipantDef, String> {
    let (library_name, participant_name) = config_name
        .split_once("::")
        .ok_or_else(|| format!("participant profile '{}' is not Library::Participant", config_name))?;

    let node = elements_named(root, "domain_participant_library")
        .filter(|l| l.attribute("name") == Some(library_name))
        .flat_map(child_elements)
        .find(|p| {
            p.tag_name().name() == "domain_participant" && p.attribute("name") == Some(participant_name)
        })
        .ok_or_else(|| format!("participant profile '{}' not found", config_name))?;

    let mut domain = match node.attribute("domain_ref") {
        Some(domain_ref) => {
            let base = domains
                .get(domain_ref)
                .ok_or_else(|| format!("domain '{}' not found", domain_ref))?;
            DomainDef {
                domain_id: base.domain_id,
                topics: base.topics.clone(),
            }
        }
        None => DomainDef::default(),
    };
    if node.attribute("domain_id").is_some() {
        domain.domain_id = parse_domain_id(node)?;
    }
    parse_topics(node, model, &mut domain)?;

    let mut participant = ParticipantDef {
        domain_id: domain.domain_id,
        writers: Vec::new(),
        readers: Vec::new(),
    };
    for group in child_elements(node) {
        let (endpoint_tag, is_writer) = match group.tag_name().name() {
            "publisher" => ("data_writer", true),
            "subscriber" => ("data_reader", false),
            _ => continue,
        };
        let group_name = required(group, "name")?;
        for endpoint in child_elements(group).filter(|n| n.tag_name().name() == endpoint_tag) {
            let topic = required(endpoint, "topic_ref")?;
            let type_name = domain
                .topics
                .get(topic)
                .ok_or_else(|| format!("topic '{}' not found", topic))?
                .clone();
            let def = EndpointDef {
                name: qualify(group_name, required(endpoint, "name")?),
                topic: topic.to_string(),
                type_name,
            };
            if is_writer {
                participant.writers.push(def);
            } else {
                participant.readers.push(def);
            }
        }
    }
    Ok(participant)
}
