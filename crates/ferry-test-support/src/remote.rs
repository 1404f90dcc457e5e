//! In-memory remote speaking both backend dialects.
//!
//! # Design
//! - Resources live in one map keyed by decoded absolute path.
//! - The service dialect answers batches with one aggregate task that stops at the first
//!   conflict; the device dialect answers with one task per item.
//! - Cursor tokens are minted per conflict and name the position to resume from.
//! - Faults are queued and consumed one per call, before routing.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ferry_core::path::encode_absolute;
use ferry_core::wire::{
    BatchRequestBody, CODE_CONFLICT, CODE_DESTINATION_NOT_FOUND, CODE_SOURCE_NOT_FOUND, OpenBody,
    RC_NAME_REJECTED, RC_OK, RC_QUOTA_EXCEEDED, ResourceBody, ResultCodeBody, SubmissionBody,
    UploadBody, WireItem,
};
use ferry_core::{
    BackgroundTask, BatchAction, ConflictDisposition, Cursor, Method, Request, ResolutionDirective,
    ResourceKind, Response, TaskFailure, TaskRef, TaskRefs, TaskStatus, Transport, TransportError,
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Service,
    Device,
}

impl Dialect {
    const fn api(self) -> &'static str {
        match self {
            Self::Service => "/api/v1",
            Self::Device => "/api/device",
        }
    }

    const fn files(self) -> &'static str {
        match self {
            Self::Service => "/files",
            Self::Device => "",
        }
    }

    const fn roots(self) -> &'static [&'static str] {
        match self {
            Self::Service => &["/webdav/Users", "/webdav/Shared", "/webdav/Backups"],
            Self::Device => &["/share"],
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File(Vec<u8>),
}

#[derive(Debug)]
struct StoredTask {
    task: BackgroundTask,
    running_polls: u32,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    tasks: HashMap<String, StoredTask>,
    next_id: u64,
    requests: Vec<Request>,
    faults: VecDeque<TransportError>,
    running_polls: u32,
    quota: Option<u64>,
    rejected_suffixes: Vec<String>,
    read_only: HashSet<String>,
}

enum ItemResult {
    Done,
    Conflict,
    Failed(&'static str, String),
}

/// Resume point encoded in a cursor token.
enum Resume {
    Position(usize),
    Item(usize),
}

/// In-memory backend implementing [`Transport`].
#[derive(Debug)]
pub struct FakeRemote {
    dialect: Dialect,
    state: Mutex<State>,
}

impl FakeRemote {
    /// Multi-tenant service dialect: namespaces under `/webdav`, aggregate tasks.
    #[must_use]
    pub fn service() -> Self {
        Self::new(Dialect::Service)
    }

    /// Embedded device dialect: everything under `/share`, one task per item.
    #[must_use]
    pub fn device() -> Self {
        Self::new(Dialect::Device)
    }

    fn new(dialect: Dialect) -> Self {
        let mut state = State::default();
        for root in dialect.roots() {
            state.nodes.insert((*root).to_string(), Node::Folder);
        }
        Self {
            dialect,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a folder (and its parents) at a decoded absolute path.
    pub fn add_folder(&self, path: &str) {
        let mut state = self.lock();
        ensure_parents(&mut state.nodes, path);
        state.nodes.insert(path.to_string(), Node::Folder);
    }

    /// Create a file (and its parents) at a decoded absolute path.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        let mut state = self.lock();
        ensure_parents(&mut state.nodes, path);
        state
            .nodes
            .insert(path.to_string(), Node::File(content.to_vec()));
    }

    /// Whether anything exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(path)
    }

    /// Content of the file at `path`.
    #[must_use]
    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// Fail the next call with `error`; queued faults are consumed in order.
    pub fn inject_fault(&self, error: TransportError) {
        self.lock().faults.push_back(error);
    }

    /// Report new tasks as running for `polls` polls before their terminal state.
    pub fn set_running_polls(&self, polls: u32) {
        self.lock().running_polls = polls;
    }

    /// Cap the bytes further uploads may store.
    pub fn set_quota(&self, bytes: u64) {
        self.lock().quota = Some(bytes);
    }

    /// Refuse uploads whose name ends with `suffix`.
    pub fn reject_names_ending_with(&self, suffix: &str) {
        self.lock().rejected_suffixes.push(suffix.to_string());
    }

    /// Report the folder at `path` as not writable.
    pub fn mark_read_only(&self, path: &str) {
        self.lock().read_only.insert(path.to_string());
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Decoded bodies of every batch submission, in order.
    #[must_use]
    pub fn batch_submissions(&self) -> Vec<BatchRequestBody> {
        let batch = self.batch_path();
        self.lock()
            .requests
            .iter()
            .filter(|request| request.path == batch)
            .filter_map(|request| request.body.clone())
            .filter_map(|body| serde_json::from_value(body).ok())
            .collect()
    }

    /// Requests whose path starts with `prefix`.
    #[must_use]
    pub fn count_requests(&self, prefix: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.path.starts_with(prefix))
            .count()
    }

    fn batch_path(&self) -> String {
        format!("{}{}/batch", self.dialect.api(), self.dialect.files())
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}{}/{name}", self.dialect.api(), self.dialect.files())
    }

    fn decode_wire(&self, wire: &str) -> String {
        match self.dialect {
            Dialect::Service => urlencoding::decode(wire)
                .map_or_else(|_| wire.to_string(), std::borrow::Cow::into_owned),
            Dialect::Device => wire.to_string(),
        }
    }

    fn encode_wire(&self, absolute: &str) -> String {
        match self.dialect {
            Dialect::Service => encode_absolute(absolute),
            Dialect::Device => absolute.to_string(),
        }
    }

    fn route(&self, state: &mut State, request: &Request) -> Result<Response, TransportError> {
        let tasks_prefix = format!("{}/tasks/", self.dialect.api());
        match (request.method, request.path.as_str()) {
            (Method::Post, path) if path == self.batch_path() => self.submit(state, request),
            (Method::Get, path) if path.starts_with(&tasks_prefix) => {
                let id = urlencoding::decode(&path[tasks_prefix.len()..])
                    .map_or_else(|_| String::new(), std::borrow::Cow::into_owned);
                poll(state, &id)
            }
            (Method::Get, path) if path == self.endpoint("resource") => {
                self.resource(state, request)
            }
            (Method::Get, path) if path == self.endpoint("content") => self.open(state, request),
            (Method::Put, path) if path == self.endpoint("upload") => self.upload(state, request),
            _ => Err(not_found("no_route", &request.path)),
        }
    }

    fn submit(&self, state: &mut State, request: &Request) -> Result<Response, TransportError> {
        let body: BatchRequestBody = decode(request.body.as_ref())?;
        let resume = body.cursor.as_ref().and_then(|cursor| parse_token(cursor.token()));
        let directive = body.cursor.as_ref().and_then(Cursor::directive);

        let tasks = match self.dialect {
            Dialect::Service => {
                let start = match resume {
                    Some(Resume::Position(position)) => position,
                    _ => 0,
                };
                TaskRefs::Aggregate(self.run_aggregate(state, &body, start, directive))
            }
            Dialect::Device => {
                let focus = match resume {
                    Some(Resume::Item(index)) => Some(index),
                    _ => None,
                };
                TaskRefs::PerItem(self.run_per_item(state, &body, focus, directive))
            }
        };
        to_response(&SubmissionBody { tasks })
    }

    fn run_aggregate(
        &self,
        state: &mut State,
        body: &BatchRequestBody,
        start: usize,
        directive: Option<ResolutionDirective>,
    ) -> TaskRef {
        let mut failures = Vec::new();
        let mut cursor = None;
        for (index, item) in body.items.iter().enumerate().skip(start) {
            let disposition = directive.and_then(|directive| {
                (index == start || directive.apply_to_all).then_some(directive.disposition)
            });
            match self.apply(state, body.action, item, disposition) {
                ItemResult::Done => {}
                ItemResult::Conflict => {
                    failures.push(failure(CODE_CONFLICT, "destination exists", &item.source));
                    cursor = Some(mint_cursor(state, &format!("pos:{index}")));
                    break;
                }
                ItemResult::Failed(code, message) => {
                    failures.push(failure(code, &message, &item.source));
                }
            }
        }
        let status = if cursor.is_some() {
            TaskStatus::Failed
        } else if failures.is_empty() {
            TaskStatus::Completed
        } else {
            TaskStatus::CompletedWithWarnings
        };
        store_task(state, status, failures, cursor)
    }

    fn run_per_item(
        &self,
        state: &mut State,
        body: &BatchRequestBody,
        focus: Option<usize>,
        directive: Option<ResolutionDirective>,
    ) -> Vec<TaskRef> {
        let mut refs = Vec::with_capacity(body.items.len());
        for (index, item) in body.items.iter().enumerate() {
            if focus.is_some_and(|focus| focus != index) {
                refs.push(store_task(state, TaskStatus::Completed, Vec::new(), None));
                continue;
            }
            let disposition = directive.map(|directive| directive.disposition);
            let task = match self.apply(state, body.action, item, disposition) {
                ItemResult::Done => store_task(state, TaskStatus::Completed, Vec::new(), None),
                ItemResult::Conflict => {
                    let cursor = mint_cursor(state, &format!("item:{index}"));
                    store_task(
                        state,
                        TaskStatus::Failed,
                        vec![failure(CODE_CONFLICT, "destination exists", &item.source)],
                        Some(cursor),
                    )
                }
                ItemResult::Failed(code, message) => store_task(
                    state,
                    TaskStatus::Failed,
                    vec![failure(code, &message, &item.source)],
                    None,
                ),
            };
            refs.push(task);
        }
        refs
    }

    fn apply(
        &self,
        state: &mut State,
        action: BatchAction,
        item: &WireItem,
        disposition: Option<ConflictDisposition>,
    ) -> ItemResult {
        let source = self.decode_wire(&item.source);
        if !state.nodes.contains_key(&source) {
            return ItemResult::Failed(CODE_SOURCE_NOT_FOUND, format!("{source} does not exist"));
        }
        if action == BatchAction::Delete {
            remove_tree(&mut state.nodes, &source);
            return ItemResult::Done;
        }
        let Some(destination) = item.destination.as_deref().map(|wire| self.decode_wire(wire))
        else {
            return ItemResult::Failed("invalid_request", "destination missing".to_string());
        };
        if !matches!(state.nodes.get(parent_of(&destination)), Some(Node::Folder)) {
            return ItemResult::Failed(
                CODE_DESTINATION_NOT_FOUND,
                format!("{} does not exist", parent_of(&destination)),
            );
        }
        let destination = if state.nodes.contains_key(&destination) {
            match disposition {
                None => return ItemResult::Conflict,
                Some(ConflictDisposition::Skip) => return ItemResult::Done,
                Some(ConflictDisposition::Overwrite) => {
                    remove_tree(&mut state.nodes, &destination);
                    destination
                }
                Some(ConflictDisposition::KeepBoth) => free_name(&state.nodes, &destination),
            }
        } else {
            destination
        };
        copy_tree(&mut state.nodes, &source, &destination);
        if matches!(action, BatchAction::Move | BatchAction::Rename) {
            remove_tree(&mut state.nodes, &source);
        }
        ItemResult::Done
    }

    fn resource(&self, state: &State, request: &Request) -> Result<Response, TransportError> {
        let path = self.decode_wire(request.query_value("path").unwrap_or_default());
        let node = state
            .nodes
            .get(&path)
            .ok_or_else(|| not_found("not_found", &path))?;
        let (kind, size) = match node {
            Node::Folder => (ResourceKind::Folder, 0),
            Node::File(content) => (ResourceKind::File, content.len() as u64),
        };
        to_response(&ResourceBody {
            href: self.encode_wire(&path),
            kind,
            size,
            writable: !state.read_only.contains(&path),
        })
    }

    fn open(&self, state: &mut State, request: &Request) -> Result<Response, TransportError> {
        let path = self.decode_wire(request.query_value("path").unwrap_or_default());
        let size = match state.nodes.get(&path) {
            Some(Node::File(content)) => content.len() as u64,
            Some(Node::Folder) => {
                return Err(TransportError::Application {
                    status: 400,
                    code: Some("is_folder".into()),
                    message: format!("{path} is a folder"),
                });
            }
            None => return Err(not_found("not_found", &path)),
        };
        state.next_id += 1;
        to_response(&OpenBody {
            href: self.encode_wire(&path),
            size,
            handle: format!("h-{}", state.next_id),
        })
    }

    fn upload(&self, state: &mut State, request: &Request) -> Result<Response, TransportError> {
        let body: UploadBody = decode(request.body.as_ref())?;
        let folder = self.decode_wire(&body.folder);
        if state
            .rejected_suffixes
            .iter()
            .any(|suffix| body.name.ends_with(suffix.as_str()))
        {
            return to_response(&ResultCodeBody {
                rc: RC_NAME_REJECTED.into(),
                message: format!("{} is not allowed", body.name),
            });
        }
        let content = STANDARD
            .decode(body.content.as_bytes())
            .map_err(|err| TransportError::Application {
                status: 400,
                code: Some("bad_content".into()),
                message: err.to_string(),
            })?;
        let size = content.len() as u64;
        if let Some(quota) = state.quota {
            if size > quota {
                return to_response(&ResultCodeBody {
                    rc: RC_QUOTA_EXCEEDED.into(),
                    message: format!("{size} bytes exceed the remaining {quota}"),
                });
            }
            state.quota = Some(quota - size);
        }
        state
            .nodes
            .insert(format!("{folder}/{}", body.name), Node::File(content));
        to_response(&ResultCodeBody {
            rc: RC_OK.into(),
            message: String::new(),
        })
    }
}

#[async_trait]
impl Transport for FakeRemote {
    async fn call(&self, request: &Request) -> Result<Response, TransportError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        if let Some(fault) = state.faults.pop_front() {
            return Err(fault);
        }
        self.route(&mut state, request)
    }
}

fn poll(state: &mut State, id: &str) -> Result<Response, TransportError> {
    let stored = state
        .tasks
        .get_mut(id)
        .ok_or_else(|| not_found("task_not_found", id))?;
    if stored.running_polls > 0 {
        stored.running_polls -= 1;
        let running = BackgroundTask {
            status: TaskStatus::Running,
            progress: "in progress".into(),
            failures: Vec::new(),
            cursor: None,
            finished_at: None,
            ..stored.task.clone()
        };
        return to_response(&running);
    }
    to_response(&stored.task)
}

fn store_task(
    state: &mut State,
    status: TaskStatus,
    failures: Vec<TaskFailure>,
    cursor: Option<Cursor>,
) -> TaskRef {
    state.next_id += 1;
    let id = TaskRef::new(format!("task-{}", state.next_id));
    let task = BackgroundTask {
        id: id.clone(),
        status,
        progress: status.as_str().to_string(),
        failures,
        cursor,
        started_at: None,
        finished_at: None,
    };
    let running_polls = state.running_polls;
    state.tasks.insert(
        id.as_str().to_string(),
        StoredTask {
            task,
            running_polls,
        },
    );
    id
}

fn mint_cursor(state: &mut State, position: &str) -> Cursor {
    state.next_id += 1;
    Cursor::new(format!("{:016x}:{position}", state.next_id))
}

fn parse_token(token: &str) -> Option<Resume> {
    let mut parts = token.splitn(3, ':');
    let _serial = parts.next()?;
    let kind = parts.next()?;
    let index = parts.next()?.parse().ok()?;
    match kind {
        "pos" => Some(Resume::Position(index)),
        "item" => Some(Resume::Item(index)),
        _ => None,
    }
}

fn failure(code: &str, message: &str, wire_source: &str) -> TaskFailure {
    TaskFailure {
        code: code.to_string(),
        message: message.to_string(),
        path: Some(wire_source.to_string()),
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

fn ensure_parents(nodes: &mut BTreeMap<String, Node>, path: &str) {
    let mut parent = parent_of(path);
    while !parent.is_empty() {
        nodes.entry(parent.to_string()).or_insert(Node::Folder);
        parent = parent_of(parent);
    }
}

fn subtree_keys(nodes: &BTreeMap<String, Node>, root: &str) -> Vec<String> {
    let prefix = format!("{root}/");
    nodes
        .keys()
        .filter(|key| *key == root || key.starts_with(&prefix))
        .cloned()
        .collect()
}

fn remove_tree(nodes: &mut BTreeMap<String, Node>, root: &str) {
    for key in subtree_keys(nodes, root) {
        nodes.remove(&key);
    }
}

fn copy_tree(nodes: &mut BTreeMap<String, Node>, from: &str, to: &str) {
    let copies: Vec<(String, Node)> = subtree_keys(nodes, from)
        .into_iter()
        .filter_map(|key| {
            let node = nodes.get(&key)?.clone();
            Some((format!("{to}{}", &key[from.len()..]), node))
        })
        .collect();
    nodes.extend(copies);
}

fn free_name(nodes: &BTreeMap<String, Node>, taken: &str) -> String {
    let (folder, name) = taken.rsplit_once('/').unwrap_or(("", taken));
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, format!(".{extension}")),
        _ => (name, String::new()),
    };
    (1..)
        .map(|counter| format!("{folder}/{stem} ({counter}){extension}"))
        .find(|candidate| !nodes.contains_key(candidate))
        .unwrap_or_else(|| taken.to_string())
}

fn not_found(code: &str, what: &str) -> TransportError {
    TransportError::Application {
        status: 404,
        code: Some(code.to_string()),
        message: format!("{what} not found"),
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Option<&Value>) -> Result<T, TransportError> {
    let body = body.ok_or_else(|| TransportError::Application {
        status: 400,
        code: Some("invalid_request".into()),
        message: "missing body".into(),
    })?;
    T::deserialize(body).map_err(|err| TransportError::Application {
        status: 400,
        code: Some("invalid_request".into()),
        message: err.to_string(),
    })
}

fn to_response<T: serde::Serialize>(body: &T) -> Result<Response, TransportError> {
    serde_json::to_value(body)
        .map(Response::ok)
        .map_err(|err| TransportError::Protocol {
            detail: err.to_string(),
        })
}
