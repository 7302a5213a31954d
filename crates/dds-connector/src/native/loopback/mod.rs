// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process implementation of [`NativeApi`].
//!
//! Emulates what the vendor library does at the boundary, inside one
//! process and without any wire protocol: participants are built from the
//! XML application model, every writer is matched with every reader of the
//! same domain, topic and type, and a write is delivered synchronously into
//! the matched readers' queues. Each reader keeps the last
//! [`HISTORY_DEPTH`] samples of every instance until they are taken.
//!
//! # Architecture
//!
//! ```text
//! LoopbackApi
//! +-- state: Mutex<State>
//! |   +-- participants: id -> Participant (writer ids, reader ids)
//! |   +-- writers:      id -> Writer (staging record, guid, matches)
//! |   +-- readers:      id -> Reader (queue, loan, matches)
//! |   +-- last_error
//! +-- changed: Condvar   (data delivered, endpoints matched/unmatched)
//! +-- outstanding: AtomicUsize  (strings handed out, not yet freed)
//! ```
//!
//! Handles are id tokens, never dereferenced. Each `LoopbackApi` is its own
//! isolated "network"; share one `Arc<LoopbackApi>` between connectors that
//! should see each other.

pub(crate) mod model;
pub(crate) mod record;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ffi::{c_void, CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde_json::Value;

use self::model::{EndpointDef, Model, StructType};
use self::record::Target;
use super::{NativeApi, NativeHandle, NativeString};
use crate::config::ConfigSource;
use crate::identity::Identity;
use crate::params::{InstanceState, WriteAction, WriteParams};
use crate::status::ReturnCode;

/// Samples a reader keeps per instance (keep-last history).
pub const HISTORY_DEPTH: usize = 256;

/// Failure of one loopback call.
enum Failure {
    /// Status without a message (NO_DATA, TIMEOUT).
    Code(ReturnCode),
    /// Status plus the text reported through the last-error facility.
    Error(ReturnCode, String),
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::Error(ReturnCode::ERROR, message)
    }
}

type Outcome<T> = std::result::Result<T, Failure>;

fn bad_parameter(message: impl Into<String>) -> Failure {
    Failure::Error(ReturnCode::BAD_PARAMETER, message.into())
}

/// Endpoints match when all three agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    domain_id: i32,
    topic: String,
    type_name: String,
}

impl MatchKey {
    fn new(domain_id: i32, def: &EndpointDef) -> Self {
        Self {
            domain_id,
            topic: def.topic.clone(),
            type_name: def.type_name.clone(),
        }
    }
}

struct Participant {
    writers: Vec<usize>,
    readers: Vec<usize>,
}

struct Writer {
    name: String,
    key: MatchKey,
    model: Arc<Model>,
    staging: Value,
    guid: [u8; 16],
    last_sequence: i64,
    matched: BTreeSet<usize>,
    reported_matches: usize,
}

impl Writer {
    fn struct_type(&self) -> Outcome<&StructType> {
        self.model
            .struct_type(&self.key.type_name)
            .ok_or_else(|| Failure::from(format!("type '{}' not declared", self.key.type_name)))
    }
}

#[derive(Debug, Clone)]
struct Received {
    data: Value,
    instance: String,
    valid: bool,
    source_timestamp: i64,
    reception_timestamp: i64,
    identity: Identity,
    related: Option<Identity>,
    read: bool,
    view_new: bool,
    instance_state: InstanceState,
}

struct Reader {
    name: String,
    key: MatchKey,
    model: Arc<Model>,
    queue: Vec<Received>,
    loan: Vec<Received>,
    viewed: HashSet<String>,
    data_available: bool,
    matched: BTreeSet<usize>,
    reported_matches: usize,
}

impl Reader {
    fn struct_type(&self) -> Outcome<&StructType> {
        self.model
            .struct_type(&self.key.type_name)
            .ok_or_else(|| Failure::from(format!("type '{}' not declared", self.key.type_name)))
    }

    /// Sample at a 1-based index of the current loan.
    fn loaned(&self, index: i32) -> Outcome<&Received> {
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.loan.get(i))
            .ok_or_else(|| {
                bad_parameter(format!(
                    "index {} out of bounds ({} samples)",
                    index,
                    self.loan.len()
                ))
            })
    }

    /// Drop the oldest sample of `instance` once it holds more than
    /// [`HISTORY_DEPTH`] samples.
    fn keep_last(&mut self, instance: &str) {
        let held = self.queue.iter().filter(|s| s.instance == instance).count();
        if held > HISTORY_DEPTH {
            if let Some(oldest) = self.queue.iter().position(|s| s.instance == instance) {
                self.queue.remove(oldest);
            }
        }
    }

    /// Move samples into the loan, updating view and sample states.
    fn lend(&mut self, take: bool) -> Outcome<()> {
        self.data_available = false;
        if self.queue.is_empty() {
            self.loan.clear();
            return Err(Failure::Code(ReturnCode::NO_DATA));
        }
        let mut loan = if take {
            std::mem::take(&mut self.queue)
        } else {
            self.queue.clone()
        };
        let mut fresh = HashSet::new();
        for sample in &mut loan {
            if !self.viewed.contains(&sample.instance) {
                fresh.insert(sample.instance.clone());
            }
            sample.view_new = fresh.contains(&sample.instance);
        }
        for sample in &loan {
            if sample.instance_state == InstanceState::Alive {
                self.viewed.insert(sample.instance.clone());
            } else {
                self.viewed.remove(&sample.instance);
            }
        }
        for sample in &mut self.queue {
            sample.read = true;
        }
        self.loan = loan;
        Ok(())
    }
}

#[derive(Default)]
struct State {
    next_id: usize,
    participants: HashMap<usize, Participant>,
    writers: HashMap<usize, Writer>,
    readers: HashMap<usize, Reader>,
    last_error: Option<String>,
}

impl State {
    fn allocate(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn participant(&self, connector: NativeHandle) -> Outcome<&Participant> {
        self.participants
            .get(&id_of(connector))
            .ok_or_else(|| Failure::Error(ReturnCode::ALREADY_DELETED, "connector not found".into()))
    }

    fn writer_id(&self, connector: NativeHandle, entity: &CStr) -> Outcome<usize> {
        let name = entity.to_string_lossy();
        self.participant(connector)?
            .writers
            .iter()
            .copied()
            .find(|id| self.writers.get(id).is_some_and(|w| w.name == name))
            .ok_or_else(|| bad_parameter(format!("writer '{}' not found", name)))
    }

    fn reader_id(&self, connector: NativeHandle, entity: &CStr) -> Outcome<usize> {
        let name = entity.to_string_lossy();
        self.participant(connector)?
            .readers
            .iter()
            .copied()
            .find(|id| self.readers.get(id).is_some_and(|r| r.name == name))
            .ok_or_else(|| bad_parameter(format!("reader '{}' not found", name)))
    }

    fn writer_mut(&mut self, connector: NativeHandle, entity: &CStr) -> Outcome<&mut Writer> {
        let id = self.writer_id(connector, entity)?;
        self.writers
            .get_mut(&id)
            .ok_or_else(|| Failure::from(format!("writer {} vanished", id)))
    }

    fn reader(&self, connector: NativeHandle, entity: &CStr) -> Outcome<&Reader> {
        let id = self.reader_id(connector, entity)?;
        self.readers
            .get(&id)
            .ok_or_else(|| Failure::from(format!("reader {} vanished", id)))
    }

    fn reader_mut(&mut self, connector: NativeHandle, entity: &CStr) -> Outcome<&mut Reader> {
        let id = self.reader_id(connector, entity)?;
        self.readers
            .get_mut(&id)
            .ok_or_else(|| Failure::from(format!("reader {} vanished", id)))
    }

    /// Match every writer/reader pair with equal keys where either side is new.
    fn match_endpoints(&mut self, fresh: &HashSet<usize>) {
        let pairs: Vec<(usize, usize)> = self
            .writers
            .iter()
            .flat_map(|(wid, w)| {
                self.readers
                    .iter()
                    .filter(move |(rid, r)| {
                        r.key == w.key && (fresh.contains(wid) || fresh.contains(*rid))
                    })
                    .map(move |(rid, _)| (*wid, *rid))
            })
            .collect();
        for (wid, rid) in pairs {
            if let Some(w) = self.writers.get_mut(&wid) {
                w.matched.insert(rid);
            }
            if let Some(r) = self.readers.get_mut(&rid) {
                r.matched.insert(wid);
            }
            log::debug!("[LOOPBACK] matched writer {} with reader {}", wid, rid);
        }
    }

    fn deliver(&mut self, writer_id: usize, params: &WriteParams) -> Outcome<()> {
        let writer = self
            .writers
            .get_mut(&writer_id)
            .ok_or_else(|| Failure::from(format!("writer {} vanished", writer_id)))?;
        let ty = writer.struct_type()?;
        let instance = record::key_of(ty, &writer.staging).to_string();
        let (data, valid, instance_state) = match params.action {
            WriteAction::Write => (writer.staging.clone(), true, InstanceState::Alive),
            WriteAction::Dispose => (
                record::key_only_record(&writer.model, ty, &writer.staging)?,
                false,
                InstanceState::NotAliveDisposed,
            ),
            WriteAction::Unregister => (
                record::key_only_record(&writer.model, ty, &writer.staging)?,
                false,
                InstanceState::NotAliveNoWriters,
            ),
        };

        let identity = match params.identity {
            Some(identity) => identity,
            None => {
                writer.last_sequence += 1;
                Identity::new(writer.guid, writer.last_sequence)
            }
        };
        let now = now_nanos();
        let sample = Received {
            data,
            instance,
            valid,
            source_timestamp: params.source_timestamp.unwrap_or(now),
            reception_timestamp: now,
            identity,
            related: params.related_sample_identity,
            read: false,
            view_new: false,
            instance_state,
        };

        let targets: Vec<usize> = writer.matched.iter().copied().collect();
        for rid in targets {
            if let Some(reader) = self.readers.get_mut(&rid) {
                reader.queue.push(sample.clone());
                reader.keep_last(&sample.instance);
                reader.data_available = true;
            }
        }
        Ok(())
    }
}

fn id_of(handle: NativeHandle) -> usize {
    handle.as_raw() as usize
}

fn handle_of(id: usize) -> Option<NativeHandle> {
    NativeHandle::from_raw(id as *mut c_void)
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// `None` means wait forever.
fn deadline(timeout_ms: i32) -> Option<Instant> {
    u64::try_from(timeout_ms)
        .ok()
        .map(|ms| Instant::now() + Duration::from_millis(ms))
}

/// In-process native layer.
pub struct LoopbackApi {
    state: Mutex<State>,
    changed: Condvar,
    outstanding: AtomicUsize,
}

impl std::fmt::Debug for LoopbackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackApi")
            .field("outstanding_strings", &self.outstanding_strings())
            .finish_non_exhaustive()
    }
}

impl Default for LoopbackApi {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// New instance behind an `Arc`, ready for [`Connector::with_api`](crate::Connector::with_api).
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Strings handed out and not yet released with `free_string`.
    pub fn outstanding_strings(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of live participants.
    pub fn participant_count(&self) -> usize {
        self.state.lock().participants.len()
    }

    fn hand_out(&self, text: String) -> Option<NativeString> {
        let c_string = CString::new(text.replace('\0', "")).unwrap_or_default();
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        NativeString::from_raw(c_string.into_raw())
    }

    fn fail(state: &mut MutexGuard<'_, State>, op: &str, failure: Failure) -> ReturnCode {
        match failure {
            Failure::Code(code) => code,
            Failure::Error(code, message) => {
                log::debug!("[LOOPBACK] {} failed: {}", op, message);
                state.last_error = Some(message);
                code
            }
        }
    }

    /// Run `f` under the state lock, recording failures as the last error.
    fn run(&self, op: &str, f: impl FnOnce(&mut State) -> Outcome<()>) -> ReturnCode {
        let mut state = self.state.lock();
        match f(&mut *state) {
            Ok(()) => ReturnCode::OK,
            Err(failure) => Self::fail(&mut state, op, failure),
        }
    }

    /// Like [`run`](Self::run) for calls producing a string.
    fn run_string(
        &self,
        op: &str,
        out: &mut Option<NativeString>,
        f: impl FnOnce(&State) -> Outcome<String>,
    ) -> ReturnCode {
        let mut state = self.state.lock();
        match f(&*state) {
            Ok(text) => {
                drop(state);
                *out = self.hand_out(text);
                ReturnCode::OK
            }
            Err(failure) => Self::fail(&mut state, op, failure),
        }
    }

    /// Replace the writer's staging record with `f` applied to a copy of it.
    fn update_staging(
        &self,
        op: &str,
        connector: NativeHandle,
        entity: &CStr,
        f: impl FnOnce(&Model, &StructType, &mut Value) -> std::result::Result<(), String>,
    ) -> ReturnCode {
        self.run(op, |state| {
            let writer = state.writer_mut(connector, entity)?;
            let ty = writer.struct_type()?;
            let mut candidate = writer.staging.clone();
            f(writer.model.as_ref(), ty, &mut candidate).map_err(bad_parameter)?;
            writer.staging = candidate;
            Ok(())
        })
    }

    fn set_field(
        &self,
        op: &str,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        convert: impl FnOnce(&Model, &model::TypeKind) -> std::result::Result<Value, String>,
    ) -> ReturnCode {
        let path = field.to_string_lossy();
        self.update_staging(op, connector, entity, |model, ty, staging| {
            let segments = record::parse_path(&path)?;
            let (kind, slot) = record::lookup_mut(model, ty, staging, &segments)?;
            *slot = convert(model, kind)?;
            Ok(())
        })
    }

    /// Resolve `field` in the loaned sample at `index` and hand the target to `f`.
    fn with_field<T>(
        state: &State,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        f: impl FnOnce(&Model, Target<'_, '_>) -> std::result::Result<T, String>,
    ) -> Outcome<T> {
        let reader = state.reader(connector, entity)?;
        let sample = reader.loaned(index)?;
        let ty = reader.struct_type()?;
        let segments = record::parse_path(&field.to_string_lossy()).map_err(bad_parameter)?;
        let target = record::lookup(&reader.model, ty, &sample.data, &segments).map_err(bad_parameter)?;
        f(reader.model.as_ref(), target).map_err(bad_parameter)
    }

    fn wait_for_matched(
        &self,
        entity: NativeHandle,
        is_reader: bool,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode {
        let deadline = deadline(timeout_ms);
        let id = id_of(entity);
        let mut state = self.state.lock();
        loop {
            let progress = if is_reader {
                state
                    .readers
                    .get_mut(&id)
                    .map(|r| (r.matched.len(), &mut r.reported_matches))
            } else {
                state
                    .writers
                    .get_mut(&id)
                    .map(|w| (w.matched.len(), &mut w.reported_matches))
            };
            let Some((current, reported)) = progress else {
                return Self::fail(
                    &mut state,
                    "wait_for_matched",
                    Failure::Error(ReturnCode::ALREADY_DELETED, "endpoint not found".into()),
                );
            };
            if current != *reported {
                let delta = i64::try_from(current).unwrap_or(i64::MAX)
                    - i64::try_from(*reported).unwrap_or(i64::MAX);
                *current_count_change = i32::try_from(delta).unwrap_or(i32::MAX);
                *reported = current;
                return ReturnCode::OK;
            }
            *current_count_change = 0;
            match deadline {
                None => self.changed.wait(&mut state),
                Some(d) if Instant::now() >= d => return ReturnCode::TIMEOUT,
                Some(d) => {
                    let _ = self.changed.wait_until(&mut state, d);
                }
            }
        }
    }

    fn matched_names(
        &self,
        entity: NativeHandle,
        is_reader: bool,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        self.run_string("get_matched", out, |state| {
            let id = id_of(entity);
            let gone = || Failure::Error(ReturnCode::ALREADY_DELETED, "endpoint not found".into());
            let names: Vec<String> = if is_reader {
                let reader = state.readers.get(&id).ok_or_else(gone)?;
                reader
                    .matched
                    .iter()
                    .filter_map(|w| state.writers.get(w))
                    .map(|w| w.name.clone())
                    .collect()
            } else {
                let writer = state.writers.get(&id).ok_or_else(gone)?;
                writer
                    .matched
                    .iter()
                    .filter_map(|r| state.readers.get(r))
                    .map(|r| r.name.clone())
                    .collect()
            };
            let list: Vec<Value> = names
                .into_iter()
                .map(|name| serde_json::json!({ "name": name }))
                .collect();
            Ok(Value::Array(list).to_string())
        })
    }

    fn info_json(sample: &Received, member: &str) -> Outcome<String> {
        Ok(match member {
            "valid_data" => sample.valid.to_string(),
            "source_timestamp" => sample.source_timestamp.to_string(),
            "reception_timestamp" => sample.reception_timestamp.to_string(),
            "sample_identity" => serde_json::to_string(&sample.identity)
                .map_err(|e| Failure::from(e.to_string()))?,
            "related_sample_identity" => {
                serde_json::to_string(&sample.related.unwrap_or(Identity::UNKNOWN))
                    .map_err(|e| Failure::from(e.to_string()))?
            }
            "sample_state" => (if sample.read { "READ" } else { "NOT_READ" }).to_string(),
            "view_state" => (if sample.view_new { "NEW" } else { "NOT_NEW" }).to_string(),
            "instance_state" => sample.instance_state.as_str().to_string(),
            other => return Err(bad_parameter(format!("unknown info member '{}'", other))),
        })
    }
}

// SAFETY: every string handed out comes from `CString::into_raw` in
// `hand_out` and stays valid until `free_string` reclaims it.
unsafe impl NativeApi for LoopbackApi {
    fn connector_new(&self, config_name: &CStr, config_url: &CStr) -> Option<NativeHandle> {
        let name = config_name.to_string_lossy();
        let loaded = ConfigSource::parse(&config_url.to_string_lossy())
            .and_then(|source| source.load())
            .map_err(|e| e.to_string())
            .and_then(|xml| model::load(&xml, &name));

        let mut state = self.state.lock();
        let (model, def) = match loaded {
            Ok(loaded) => loaded,
            Err(message) => {
                log::warn!("[LOOPBACK] cannot create participant '{}': {}", name, message);
                state.last_error = Some(message);
                return None;
            }
        };
        let model = Arc::new(model);

        let mut fresh = HashSet::new();
        let mut writers = Vec::new();
        for w in &def.writers {
            let staging = match model
                .struct_type(&w.type_name)
                .ok_or_else(|| format!("type '{}' not declared", w.type_name))
                .and_then(|ty| record::default_record(&model, ty))
            {
                Ok(staging) => staging,
                Err(message) => {
                    state.last_error = Some(message);
                    return None;
                }
            };
            let id = state.allocate();
            writers.push((
                id,
                Writer {
                    name: w.name.clone(),
                    key: MatchKey::new(def.domain_id, w),
                    model: Arc::clone(&model),
                    staging,
                    guid: [0; 16],
                    last_sequence: 0,
                    matched: BTreeSet::new(),
                    reported_matches: 0,
                },
            ));
        }
        let mut readers = Vec::new();
        for r in &def.readers {
            let id = state.allocate();
            readers.push((
                id,
                Reader {
                    name: r.name.clone(),
                    key: MatchKey::new(def.domain_id, r),
                    model: Arc::clone(&model),
                    queue: Vec::new(),
                    loan: Vec::new(),
                    viewed: HashSet::new(),
                    data_available: false,
                    matched: BTreeSet::new(),
                    reported_matches: 0,
                },
            ));
        }

        let participant_id = state.allocate();
        let mut participant = Participant {
            writers: Vec::new(),
            readers: Vec::new(),
        };
        for (id, mut writer) in writers {
            writer.guid[..8].copy_from_slice(&(participant_id as u64).to_be_bytes());
            writer.guid[8..].copy_from_slice(&(id as u64).to_be_bytes());
            participant.writers.push(id);
            fresh.insert(id);
            state.writers.insert(id, writer);
        }
        for (id, reader) in readers {
            participant.readers.push(id);
            fresh.insert(id);
            state.readers.insert(id, reader);
        }
        state.participants.insert(participant_id, participant);
        state.match_endpoints(&fresh);
        drop(state);
        self.changed.notify_all();

        log::info!("[LOOPBACK] participant '{}' created (id={})", name, participant_id);
        handle_of(participant_id)
    }

    fn connector_delete(&self, connector: NativeHandle) {
        let id = id_of(connector);
        let mut state = self.state.lock();
        let Some(participant) = state.participants.remove(&id) else {
            return;
        };
        for wid in &participant.writers {
            state.writers.remove(wid);
        }
        for rid in &participant.readers {
            state.readers.remove(rid);
        }
        for reader in state.readers.values_mut() {
            reader.matched.retain(|w| !participant.writers.contains(w));
        }
        for writer in state.writers.values_mut() {
            writer.matched.retain(|r| !participant.readers.contains(r));
        }
        drop(state);
        self.changed.notify_all();
        log::info!("[LOOPBACK] participant {} deleted", id);
    }

    fn get_datareader(&self, connector: NativeHandle, entity: &CStr) -> Option<NativeHandle> {
        let mut state = self.state.lock();
        match state.reader_id(connector, entity) {
            Ok(id) => handle_of(id),
            Err(failure) => {
                Self::fail(&mut state, "get_datareader", failure);
                None
            }
        }
    }

    fn get_datawriter(&self, connector: NativeHandle, entity: &CStr) -> Option<NativeHandle> {
        let mut state = self.state.lock();
        match state.writer_id(connector, entity) {
            Ok(id) => handle_of(id),
            Err(failure) => {
                Self::fail(&mut state, "get_datawriter", failure);
                None
            }
        }
    }

    fn read(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        self.run("read", |state| state.reader_mut(connector, entity)?.lend(false))
    }

    fn take(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        self.run("take", |state| state.reader_mut(connector, entity)?.lend(true))
    }

    fn return_loan(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        self.run("return_loan", |state| {
            state.reader_mut(connector, entity)?.loan.clear();
            Ok(())
        })
    }

    fn write(&self, connector: NativeHandle, entity: &CStr, params: Option<&CStr>) -> ReturnCode {
        let code = self.run("write", |state| {
            let params: WriteParams = match params {
                Some(json) => serde_json::from_str(&json.to_string_lossy())
                    .map_err(|e| bad_parameter(format!("invalid write parameters: {}", e)))?,
                None => WriteParams::default(),
            };
            let id = state.writer_id(connector, entity)?;
            state.deliver(id, &params)
        });
        if code.is_ok() {
            self.changed.notify_all();
        }
        code
    }

    fn clear(&self, connector: NativeHandle, entity: &CStr) -> ReturnCode {
        self.update_staging("clear", connector, entity, |model, ty, staging| {
            *staging = record::default_record(model, ty)?;
            Ok(())
        })
    }

    fn get_number_from_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        field: &CStr,
        out: &mut f64,
    ) -> ReturnCode {
        self.run("get_number_from_sample", |state| {
            *out = Self::with_field(state, connector, entity, index, field, |_, target| match target {
                Target::Element(kind, value) => record::number_of(kind, value),
                Target::Length(len) => Ok(len as f64),
                Target::Collection(_) => Err("cannot read a collection as a number".into()),
            })?;
            Ok(())
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
        self.run("get_boolean_from_sample", |state| {
            let value = Self::with_field(state, connector, entity, index, field, |_, target| match target {
                Target::Element(kind, value) => record::bool_of(kind, value),
                _ => Err("cannot read a collection as a boolean".into()),
            })?;
            *out = i32::from(value);
            Ok(())
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
        self.run_string("get_string_from_sample", out, |state| {
            Self::with_field(state, connector, entity, index, field, |model, target| {
                Ok(match target {
                    Target::Element(kind, value) => record::string_of(model, kind, value),
                    Target::Collection(value) => value.to_string(),
                    Target::Length(len) => len.to_string(),
                })
            })
        })
    }

    fn set_number_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: f64,
    ) -> ReturnCode {
        self.set_field("set_number_into_samples", connector, entity, field, |model, kind| {
            record::number_value(model, kind, value)
        })
    }

    fn set_boolean_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: i32,
    ) -> ReturnCode {
        self.set_field("set_boolean_into_samples", connector, entity, field, |_, kind| {
            record::bool_value(kind, value != 0)
        })
    }

    fn set_string_into_samples(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        field: &CStr,
        value: &CStr,
    ) -> ReturnCode {
        let text = value.to_string_lossy();
        self.set_field("set_string_into_samples", connector, entity, field, |model, kind| {
            record::string_value(model, kind, &text)
        })
    }

    fn get_json_sample(
        &self,
        connector: NativeHandle,
        entity: &CStr,
        index: i32,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        self.run_string("get_json_sample", out, |state| {
            let reader = state.reader(connector, entity)?;
            Ok(reader.loaned(index)?.data.to_string())
        })
    }

    fn set_json_instance(&self, connector: NativeHandle, entity: &CStr, json: &CStr) -> ReturnCode {
        let text = json.to_string_lossy();
        self.update_staging("set_json_instance", connector, entity, |model, ty, staging| {
            let parsed: Value =
                serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {}", e))?;
            let mut fresh = record::default_record(model, ty)?;
            record::merge_json(model, ty, &mut fresh, &parsed)?;
            *staging = fresh;
            Ok(())
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
        self.run("get_boolean_from_infos", |state| {
            let sample = state.reader(connector, entity)?.loaned(index)?;
            match member.to_bytes() {
                b"valid_data" => {
                    *out = i32::from(sample.valid);
                    Ok(())
                }
                _ => Err(bad_parameter(format!(
                    "info member '{}' is not a boolean",
                    member.to_string_lossy()
                ))),
            }
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
        self.run_string("get_json_from_infos", out, |state| {
            let sample = state.reader(connector, entity)?.loaned(index)?;
            Self::info_json(sample, &member.to_string_lossy())
        })
    }

    fn get_sample_count(&self, connector: NativeHandle, entity: &CStr, out: &mut f64) -> ReturnCode {
        self.run("get_sample_count", |state| {
            *out = state.reader(connector, entity)?.loan.len() as f64;
            Ok(())
        })
    }

    fn wait_for_data(&self, connector: NativeHandle, timeout_ms: i32) -> ReturnCode {
        let deadline = deadline(timeout_ms);
        let mut state = self.state.lock();
        loop {
            let ready = match state.participant(connector) {
                Ok(p) => p
                    .readers
                    .iter()
                    .any(|id| state.readers.get(id).is_some_and(|r| r.data_available)),
                Err(failure) => return Self::fail(&mut state, "wait_for_data", failure),
            };
            if ready {
                return ReturnCode::OK;
            }
            match deadline {
                None => self.changed.wait(&mut state),
                Some(d) if Instant::now() >= d => return ReturnCode::TIMEOUT,
                Some(d) => {
                    let _ = self.changed.wait_until(&mut state, d);
                }
            }
        }
    }

    fn wait_for_matched_publication(
        &self,
        reader: NativeHandle,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode {
        self.wait_for_matched(reader, true, timeout_ms, current_count_change)
    }

    fn wait_for_matched_subscription(
        &self,
        writer: NativeHandle,
        timeout_ms: i32,
        current_count_change: &mut i32,
    ) -> ReturnCode {
        self.wait_for_matched(writer, false, timeout_ms, current_count_change)
    }

    fn get_matched_publications(
        &self,
        reader: NativeHandle,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        self.matched_names(reader, true, out)
    }

    fn get_matched_subscriptions(
        &self,
        writer: NativeHandle,
        out: &mut Option<NativeString>,
    ) -> ReturnCode {
        self.matched_names(writer, false, out)
    }

    fn last_error_message(&self) -> Option<NativeString> {
        let message = self.state.lock().last_error.take()?;
        self.hand_out(message)
    }

    fn free_string(&self, s: NativeString) {
        // SAFETY: `s` came from `hand_out` on this instance (trait contract)
        // and is consumed here, so it is reclaimed exactly once.
        drop(unsafe { CString::from_raw(s.as_raw()) });
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::OwnedNativeString;

    const XML: &str = r#"str://"<dds>
<types>
  <struct name="T">
    <member name="id" type="long" key="true"/>
    <member name="x" type="double"/>
    <member name="flag" type="boolean"/>
  </struct>
</types>
<domain_library name="D"><domain name="Zero" domain_id="0">
  <register_type name="T" type_ref="T"/>
  <topic name="Topic" register_type_ref="T"/>
</domain></domain_library>
<domain_participant_library name="P">
  <domain_participant name="Both" domain_ref="D::Zero">
    <publisher name="Pub"><data_writer name="W" topic_ref="Topic"/></publisher>
    <subscriber name="Sub"><data_reader name="R" topic_ref="Topic"/></subscriber>
  </domain_participant>
</domain_participant_library>
</dds>""#;

    fn c(s: &str) -> CString {
        CString::new(s).expect("cstring")
    }

    fn open(api: &LoopbackApi) -> NativeHandle {
        api.connector_new(&c("P::Both"), &c(XML)).expect("participant")
    }

    fn text(api: &LoopbackApi, s: Option<NativeString>) -> String {
        OwnedNativeString::new(api, s).to_string_lossy()
    }

    #[test]
    fn unknown_profile_sets_last_error() {
        let api = LoopbackApi::new();
        assert!(api.connector_new(&c("P::Nope"), &c(XML)).is_none());
        let message = text(&api, api.last_error_message());
        assert!(message.contains("not found"));
        assert_eq!(api.outstanding_strings(), 0);
    }

    #[test]
    fn read_history_keeps_the_last_samples_per_instance() {
        let api = LoopbackApi::new();
        let conn = open(&api);
        let (w, r) = (c("Pub::W"), c("Sub::R"));

        let writes = HISTORY_DEPTH + 5;
        for i in 0..writes {
            assert_eq!(api.set_number_into_samples(conn, &w, &c("x"), i as f64), ReturnCode::OK);
            assert_eq!(api.write(conn, &w, None), ReturnCode::OK);
        }
        assert_eq!(api.set_number_into_samples(conn, &w, &c("id"), 1.0), ReturnCode::OK);
        assert_eq!(api.write(conn, &w, None), ReturnCode::OK);
        assert_eq!(api.read(conn, &r), ReturnCode::OK);

        let mut count = 0.0;
        assert_eq!(api.get_sample_count(conn, &r, &mut count), ReturnCode::OK);
        assert_eq!(count as usize, HISTORY_DEPTH + 1);

        let mut x = 0.0;
        assert_eq!(api.get_number_from_sample(conn, &r, 1, &c("x"), &mut x), ReturnCode::OK);
        assert_eq!(x, 5.0);
        api.connector_delete(conn);
    }

    #[test]
    fn write_take_round_trip() {
        let api = LoopbackApi::new();
        let conn = open(&api);
        let (w, r) = (c("Pub::W"), c("Sub::R"));

        assert_eq!(api.set_number_into_samples(conn, &w, &c("x"), 2.5), ReturnCode::OK);
        assert_eq!(api.set_boolean_into_samples(conn, &w, &c("flag"), 1), ReturnCode::OK);
        assert_eq!(api.write(conn, &w, None), ReturnCode::OK);
        assert_eq!(api.wait_for_data(conn, 0), ReturnCode::OK);
        assert_eq!(api.take(conn, &r), ReturnCode::OK);

        let mut count = 0.0;
        assert_eq!(api.get_sample_count(conn, &r, &mut count), ReturnCode::OK);
        assert_eq!(count, 1.0);

        let mut x = 0.0;
        assert_eq!(api.get_number_from_sample(conn, &r, 1, &c("x"), &mut x), ReturnCode::OK);
        assert_eq!(x, 2.5);

        let mut flag = 0;
        assert_eq!(api.get_boolean_from_sample(conn, &r, 1, &c("flag"), &mut flag), ReturnCode::OK);
        assert_eq!(flag, 1);

        assert_eq!(api.take(conn, &r), ReturnCode::NO_DATA);
        assert_eq!(api.wait_for_data(conn, 5), ReturnCode::TIMEOUT);
        api.connector_delete(conn);
        assert_eq!(api.participant_count(), 0);
    }

    #[test]
    fn index_is_one_based() {
        let api = LoopbackApi::new();
        let conn = open(&api);
        let (w, r) = (c("Pub::W"), c("Sub::R"));
        assert_eq!(api.write(conn, &w, None), ReturnCode::OK);
        assert_eq!(api.read(conn, &r), ReturnCode::OK);
        let mut x = 0.0;
        assert_eq!(
            api.get_number_from_sample(conn, &r, 0, &c("x"), &mut x),
            ReturnCode::BAD_PARAMETER
        );
        let _ = text(&api, api.last_error_message());
        assert_eq!(api.outstanding_strings(), 0);
    }

    #[test]
    fn failed_set_leaves_staging_untouched() {
        let api = LoopbackApi::new();
        let conn = open(&api);
        let (w, r) = (c("Pub::W"), c("Sub::R"));
        assert_eq!(api.set_number_into_samples(conn, &w, &c("id"), 7.0), ReturnCode::OK);
        assert_ne!(
            api.set_json_instance(conn, &w, &c(r#"{"id": 9, "nope": 1}"#)),
            ReturnCode::OK
        );
        assert_eq!(api.write(conn, &w, None), ReturnCode::OK);
        assert_eq!(api.take(conn, &r), ReturnCode::OK);
        let mut id = 0.0;
        assert_eq!(api.get_number_from_sample(conn, &r, 1, &c("id"), &mut id), ReturnCode::OK);
        assert_eq!(id, 7.0);
    }

    #[test]
    fn read_marks_samples_read_and_tracks_view_state() {
        let api = LoopbackApi::new();
        let conn = open(&api);
        let (w, r) = (c("Pub::W"), c("Sub::R"));
        assert_eq!(api.write(conn, &w, None), ReturnCode::OK);

        let info = |member: &str| {
            let mut out = None;
            assert_eq!(api.get_json_from_infos(conn, &r, 1, &c(member), &mut out), ReturnCode::OK);
            text(&api, out)
        };

        assert_eq!(api.read(conn, &r), ReturnCode::OK);
        assert_eq!(info("sample_state"), "NOT_READ");
        assert_eq!(info("view_state"), "NEW");
        assert_eq!(api.read(conn, &r), ReturnCode::OK);
        assert_eq!(info("sample_state"), "READ");
        assert_eq!(info("view_state"), "NOT_NEW");
        assert_eq!(info("instance_state"), "ALIVE");
        assert_eq!(api.outstanding_strings(), 0);
    }

    #[test]
    fn participants_sharing_an_api_match() {
        let api = LoopbackApi::new();
        let first = open(&api);
        let reader = api.get_datareader(first, &c("Sub::R")).expect("reader");

        let mut change = 0;
        assert_eq!(api.wait_for_matched_publication(reader, 0, &mut change), ReturnCode::OK);
        assert_eq!(change, 1);
        assert_eq!(api.wait_for_matched_publication(reader, 0, &mut change), ReturnCode::TIMEOUT);

        let second = open(&api);
        assert_eq!(api.wait_for_matched_publication(reader, 1000, &mut change), ReturnCode::OK);
        assert_eq!(change, 1);

        let mut out = None;
        assert_eq!(api.get_matched_publications(reader, &mut out), ReturnCode::OK);
        let list: Value = serde_json::from_str(&text(&api, out)).expect("json");
        assert_eq!(list.as_array().map(Vec::len), Some(2));

        api.connector_delete(second);
        assert_eq!(api.wait_for_matched_publication(reader, 1000, &mut change), ReturnCode::OK);
        assert_eq!(change, -1);
    }

    #[test]
    fn unknown_endpoint_lookup_fails() {
        let api = LoopbackApi::new();
        let conn = open(&api);
        assert!(api.get_datawriter(conn, &c("Pub::Missing")).is_none());
        assert!(api.get_datareader(conn, &c("Pub::W")).is_none());
        let _ = text(&api, api.last_error_message());
        assert_eq!(api.outstanding_strings(), 0);
    }
}
