//! Test doubles for driving a session without a server
//!
//! Every double writes what happens to it into one shared [`Timeline`], so a
//! test can assert the relative order of backend calls, log lines and UI
//! callbacks.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ferrox_config::SessionConfig;
use ferrox_session::{
    Clock, Connector, LogLevel, LogSink, SecureShell, TunnelTarget, TunnelTransport,
};
use ferrox_types::{
    unix_path, BoundProtocol, Capability, CopyParam, DeleteParams, Error, FileItem, FileList,
    FileSystemBackend, OperationProgress, Prompt, Query, QueryAnswer, RemoteFile,
    RemoteProperties, Result, SessionUi,
};

/// Ordered record of everything the doubles saw
pub type Timeline = Arc<Mutex<Vec<String>>>;

/// Create an empty timeline
pub fn timeline() -> Timeline {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of a timeline
pub fn events(timeline: &Timeline) -> Vec<String> {
    timeline
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Forget everything recorded so far
pub fn clear(timeline: &Timeline) {
    timeline
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

fn record(timeline: &Timeline, event: String) {
    timeline
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(event);
}

/// Number of recorded events starting with `prefix`
pub fn count(timeline: &Timeline, prefix: &str) -> usize {
    events(timeline)
        .iter()
        .filter(|event| event.starts_with(prefix))
        .count()
}

/// Assert that events starting with each of `prefixes` occur in this order
pub fn assert_in_order(timeline: &Timeline, prefixes: &[&str]) {
    let events = events(timeline);
    let mut from = 0;
    for prefix in prefixes {
        let position = events[from..]
            .iter()
            .position(|event| event.starts_with(prefix))
            .unwrap_or_else(|| panic!("'{}' not found after position {} in {:#?}", prefix, from, events));
        from += position + 1;
    }
}

struct Failure {
    operation: String,
    error: Error,
    remaining: usize,
}

/// State of the simulated server
pub struct MockState {
    /// Entries per absolute directory
    pub directories: BTreeMap<String, Vec<RemoteFile>>,
    /// Login directory
    pub home_directory: String,
    /// Supported optional operations
    pub capabilities: HashSet<Capability>,
    failures: Vec<Failure>,
}

/// In-memory remote file server shared between a test and its backends
#[derive(Clone)]
pub struct MockServer {
    state: Rc<RefCell<MockState>>,
    timeline: Timeline,
}

impl MockServer {
    /// Server with an empty root and `/home/user` as login directory
    pub fn new(timeline: Timeline) -> Self {
        let server = Self {
            state: Rc::new(RefCell::new(MockState {
                directories: BTreeMap::from([("/".to_string(), Vec::new())]),
                home_directory: "/home/user".to_string(),
                capabilities: HashSet::from([Capability::RemoteCopy, Capability::RemoteMove]),
                failures: Vec::new(),
            })),
            timeline,
        };
        server.add_directory("/home/user");
        server
    }

    /// Timeline the server records into
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Create a directory and its missing parents
    pub fn add_directory(&self, path: &str) {
        let path = unix_path::exclude_trailing_slash(path);
        let mut state = self.state.borrow_mut();
        let mut current = String::from("/");
        for part in path.split('/').filter(|part| !part.is_empty()) {
            let child = unix_path::join(&current, part);
            if !state.directories.contains_key(&child) {
                state.directories.insert(child.clone(), Vec::new());
                if let Some(entries) = state.directories.get_mut(&current) {
                    entries.push(RemoteFile::directory_entry(part, Utc::now()).in_directory(current.as_str()));
                }
            }
            current = child;
        }
    }

    /// Create a file, creating its directory when needed
    pub fn add_file(&self, path: &str, size: u64, modification: DateTime<Utc>) {
        let directory = unix_path::parent(path);
        self.add_directory(&directory);
        let name = unix_path::file_name(path).to_string();
        let mut state = self.state.borrow_mut();
        if let Some(entries) = state.directories.get_mut(&directory) {
            entries.retain(|entry| entry.file_name != name);
            entries.push(RemoteFile::file(name, size, modification).in_directory(directory.as_str()));
        }
    }

    /// Entry at `path`, if it exists
    pub fn entry(&self, path: &str) -> Option<RemoteFile> {
        let directory = unix_path::parent(path);
        let name = unix_path::file_name(path);
        self.state
            .borrow()
            .directories
            .get(&directory)
            .and_then(|entries| entries.iter().find(|entry| entry.file_name == name).cloned())
    }

    /// Whether `path` exists
    pub fn exists(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }

    /// Fail the next `times` calls of `operation` with `error`
    pub fn fail(&self, operation: &str, error: Error, times: usize) {
        self.state.borrow_mut().failures.push(Failure {
            operation: operation.to_string(),
            error,
            remaining: times,
        });
    }

    /// Announce an optional operation
    pub fn enable(&self, capability: Capability) {
        self.state.borrow_mut().capabilities.insert(capability);
    }

    /// Connected backend of this server, starting in the login directory
    ///
    /// Shells can run commands, FTP connections cannot.
    pub fn backend(&self, protocol: BoundProtocol) -> MockBackend {
        MockBackend {
            server: self.clone(),
            protocol,
            current_directory: self.state.borrow().home_directory.clone(),
            active: true,
        }
    }
}

/// One connection to a [`MockServer`]
pub struct MockBackend {
    server: MockServer,
    protocol: BoundProtocol,
    current_directory: String,
    active: bool,
}

impl MockBackend {
    fn call(&mut self, operation: &str, argument: &str) -> Result<()> {
        if argument.is_empty() {
            record(&self.server.timeline, format!("backend: {}", operation));
        } else {
            record(&self.server.timeline, format!("backend: {} {}", operation, argument));
        }
        let error = self
            .server
            .state
            .borrow_mut()
            .failures
            .iter_mut()
            .find(|failure| failure.operation == operation && failure.remaining > 0)
            .map(|failure| {
                failure.remaining -= 1;
                failure.error.clone()
            });
        match error {
            Some(error) => {
                if error.is_fatal() {
                    self.active = false;
                }
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn absolute(&self, path: &str) -> String {
        unix_path::expand(path, &self.current_directory)
    }

    fn remove(&self, path: &str) -> Result<()> {
        let directory = unix_path::parent(path);
        let name = unix_path::file_name(path).to_string();
        let mut state = self.server.state.borrow_mut();
        let entries = state
            .directories
            .get_mut(&directory)
            .ok_or_else(|| Error::command(format!("No such file '{}'", path)))?;
        let before = entries.len();
        entries.retain(|entry| entry.file_name != name);
        if entries.len() == before {
            return Err(Error::command(format!("No such file '{}'", path)));
        }
        let prefix = unix_path::include_trailing_slash(path);
        state
            .directories
            .retain(|directory, _| directory != path && !directory.starts_with(&prefix));
        Ok(())
    }
}

impl FileSystemBackend for MockBackend {
    fn protocol(&self) -> BoundProtocol {
        self.protocol
    }

    fn open(&mut self) -> Result<()> {
        self.call("open", "")?;
        self.active = true;
        self.current_directory = self.server.state.borrow().home_directory.clone();
        Ok(())
    }

    fn close(&mut self) {
        record(&self.server.timeline, "backend: close".to_string());
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_capable(&self, capability: Capability) -> bool {
        (capability == Capability::AnyCommand && self.protocol != BoundProtocol::Ftp)
            || self.server.state.borrow().capabilities.contains(&capability)
    }

    fn current_directory(&self) -> String {
        self.current_directory.clone()
    }

    fn read_current_directory(&mut self) -> Result<()> {
        self.call("read_current_directory", "")
    }

    fn home_directory(&mut self) -> Result<()> {
        self.call("home_directory", "")?;
        self.current_directory = self.server.state.borrow().home_directory.clone();
        Ok(())
    }

    fn change_directory(&mut self, directory: &str) -> Result<()> {
        self.call("change_directory", directory)?;
        let target = self.absolute(directory);
        if !self.server.state.borrow().directories.contains_key(&target) {
            return Err(Error::command(format!("No such directory '{}'", target)));
        }
        self.current_directory = target;
        Ok(())
    }

    fn read_directory(&mut self, list: &mut FileList) -> Result<()> {
        let directory = self.absolute(list.directory());
        self.call("read_directory", &directory)?;
        let state = self.server.state.borrow();
        let entries = state
            .directories
            .get(&directory)
            .ok_or_else(|| Error::command(format!("No such directory '{}'", directory)))?;
        if directory != "/" {
            list.add_file(RemoteFile::directory_entry("..", Utc::now()));
        }
        for entry in entries {
            list.add_file(entry.clone());
        }
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<RemoteFile> {
        let path = self.absolute(path);
        self.call("read_file", &path)?;
        self.server
            .entry(&path)
            .ok_or_else(|| Error::command(format!("No such file '{}'", path)))
    }

    fn read_symlink(&mut self, link: &RemoteFile) -> Result<RemoteFile> {
        Err(Error::command(format!("'{}' is not a link", link.file_name)))
    }

    fn create_directory(&mut self, path: &str) -> Result<()> {
        let path = self.absolute(path);
        self.call("create_directory", &path)?;
        if self.server.exists(&path) {
            return Err(Error::command(format!("'{}' already exists", path)));
        }
        self.server.add_directory(&path);
        Ok(())
    }

    fn delete_file(&mut self, path: &str, _file: Option<&RemoteFile>, _params: DeleteParams) -> Result<()> {
        let path = self.absolute(path);
        self.call("delete_file", &path)?;
        self.remove(&path)
    }

    fn rename_file(&mut self, path: &str, new_path: &str) -> Result<()> {
        let path = self.absolute(path);
        let new_path = self.absolute(new_path);
        self.call("rename_file", &format!("{} {}", path, new_path))?;
        let entry = self
            .server
            .entry(&path)
            .ok_or_else(|| Error::command(format!("No such file '{}'", path)))?;
        self.remove(&path)?;
        if entry.is_directory() {
            self.server.add_directory(&new_path);
        } else {
            self.server.add_file(&new_path, entry.size, entry.modification);
        }
        Ok(())
    }

    fn change_file_properties(
        &mut self,
        path: &str,
        _file: Option<&RemoteFile>,
        properties: &RemoteProperties,
    ) -> Result<()> {
        let path = self.absolute(path);
        self.call("change_file_properties", &path)?;
        let directory = unix_path::parent(&path);
        let name = unix_path::file_name(&path).to_string();
        let mut state = self.server.state.borrow_mut();
        let entry = state
            .directories
            .get_mut(&directory)
            .and_then(|entries| entries.iter_mut().find(|entry| entry.file_name == name))
            .ok_or_else(|| Error::command(format!("No such file '{}'", path)))?;
        if let Some(modification) = properties.modification {
            entry.modification = modification;
        }
        if let Some(rights) = properties.rights {
            entry.rights = Some(rights);
        }
        Ok(())
    }

    fn copy_to_remote(
        &mut self,
        files: &[PathBuf],
        target_directory: &str,
        _copy_param: &CopyParam,
        progress: &mut OperationProgress,
    ) -> Result<()> {
        self.call("copy_to_remote", target_directory)?;
        let target = self.absolute(target_directory);
        for file in files {
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.set_file(name.as_str())?;
            let size = fs::metadata(file).map(|metadata| metadata.len()).unwrap_or(0);
            self.server.add_file(&unix_path::join(&target, &name), size, Utc::now());
            progress.add_transferred(size)?;
            progress.finish(&name, true)?;
        }
        Ok(())
    }

    fn copy_to_local(
        &mut self,
        files: &[FileItem],
        target_directory: &Path,
        _copy_param: &CopyParam,
        progress: &mut OperationProgress,
    ) -> Result<()> {
        self.call("copy_to_local", &target_directory.to_string_lossy())?;
        for item in files {
            progress.set_file(item.name.as_str())?;
            progress.finish(&item.name, true)?;
        }
        Ok(())
    }

    fn any_command(&mut self, command: &str, output: &mut dyn FnMut(&str, bool)) -> Result<()> {
        self.call("any_command", command)?;
        output(&format!("{}$ {}", self.current_directory, command), false);
        Ok(())
    }
}

/// Shell that never asks for a fallback
#[derive(Debug, Default)]
pub struct MockShell {
    fallback_command: bool,
}

impl SecureShell for MockShell {
    fn ssh_fallback_command(&self) -> bool {
        self.fallback_command
    }
}

/// Port forward connection that records when it is closed
pub struct MockTunnel {
    timeline: Timeline,
    active: bool,
}

impl TunnelTransport for MockTunnel {
    fn idle(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        if self.active {
            record(&self.timeline, "tunnel: close".to_string());
        }
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Connector handing out [`MockBackend`]s
pub struct MockConnector {
    server: MockServer,
    failing_connections: Cell<usize>,
    fallback_command: bool,
    tunnels: Cell<bool>,
}

impl MockConnector {
    /// Connector to `server`
    pub fn new(server: MockServer) -> Self {
        Self {
            server,
            failing_connections: Cell::new(0),
            fallback_command: false,
            tunnels: Cell::new(false),
        }
    }

    /// Accept tunnel connections instead of refusing them
    pub fn enable_tunnels(&self) {
        self.tunnels.set(true);
    }

    /// Refuse the next `count` connections
    pub fn fail_connections(&self, count: usize) {
        self.failing_connections.set(count);
    }

    /// Shells report that SFTP is unavailable
    pub fn with_fallback_command(mut self) -> Self {
        self.fallback_command = true;
        self
    }
}

impl Connector for MockConnector {
    fn connect_ftp(&self, _config: &SessionConfig, _ui: Arc<dyn SessionUi>) -> Result<Box<dyn FileSystemBackend>> {
        record(self.server.timeline(), "connector: connect_ftp".to_string());
        Ok(Box::new(self.server.backend(BoundProtocol::Ftp)))
    }

    fn connect_shell(&self, config: &SessionConfig, _ui: Arc<dyn SessionUi>) -> Result<Box<dyn SecureShell>> {
        record(
            self.server.timeline(),
            format!("connector: connect_shell {}", config.host_name),
        );
        let failing = self.failing_connections.get();
        if failing > 0 {
            self.failing_connections.set(failing - 1);
            return Err(Error::fatal("Network error: Connection refused."));
        }
        Ok(Box::new(MockShell {
            fallback_command: self.fallback_command,
        }))
    }

    fn bind_shell(&self, _shell: Box<dyn SecureShell>, protocol: BoundProtocol) -> Result<Box<dyn FileSystemBackend>> {
        record(self.server.timeline(), format!("connector: bind_shell {:?}", protocol));
        Ok(Box::new(self.server.backend(protocol)))
    }

    fn open_tunnel(&self, target: &TunnelTarget, _ui: Arc<dyn SessionUi>) -> Result<Box<dyn TunnelTransport>> {
        record(
            self.server.timeline(),
            format!("connector: open_tunnel {}", target.port_forward),
        );
        if !self.tunnels.get() {
            return Err(Error::tunnel("Tunnel host refused the connection"));
        }
        Ok(Box::new(MockTunnel {
            timeline: self.server.timeline().clone(),
            active: true,
        }))
    }
}

/// UI answering queries from a script
pub struct ScriptedUi {
    timeline: Timeline,
    answers: Mutex<VecDeque<QueryAnswer>>,
    default_answer: Option<QueryAnswer>,
    directory_read_failure: Mutex<Option<Error>>,
}

impl ScriptedUi {
    /// UI falling back to each query's abort answer once the script is used up
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            answers: Mutex::new(VecDeque::new()),
            default_answer: None,
            directory_read_failure: Mutex::new(None),
        }
    }

    /// Answer with `answer` once the script is used up
    pub fn answering(mut self, answer: QueryAnswer) -> Self {
        self.default_answer = Some(answer);
        self
    }

    /// Queue answers for the next queries
    pub fn script(&self, answers: &[QueryAnswer]) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(answers.iter().copied());
    }

    /// Fail the next listing notification with `error`
    pub fn fail_directory_read(&self, error: Error) {
        *self
            .directory_read_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Number of queries asked so far
    pub fn queries(&self) -> usize {
        count(&self.timeline, "ui: query")
    }
}

impl SessionUi for ScriptedUi {
    fn query_user(&self, query: &Query) -> Result<QueryAnswer> {
        record(&self.timeline, format!("ui: query {}", query.message));
        let scripted = self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(scripted
            .or(self.default_answer)
            .unwrap_or_else(|| query.answers.abort_answer()))
    }

    fn prompt_user(&self, prompt: &Prompt) -> Result<Option<Vec<String>>> {
        record(&self.timeline, format!("ui: prompt {}", prompt.name));
        Ok(None)
    }

    fn directory_changed(&self, directory: &str) -> Result<()> {
        record(&self.timeline, format!("ui: directory_changed {}", directory));
        Ok(())
    }

    fn directory_read(&self, list: &FileList, reload_only: bool) -> Result<()> {
        record(
            &self.timeline,
            format!("ui: directory_read {} reload={}", list.directory(), reload_only),
        );
        let failure = self
            .directory_read_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        failure.map_or(Ok(()), Err)
    }

    fn show_extended_exception(&self, error: &Error) -> Result<()> {
        record(&self.timeline, format!("ui: exception {}", error));
        Ok(())
    }
}

/// Log sink writing into a timeline
pub struct RecordingLog {
    timeline: Timeline,
}

impl RecordingLog {
    /// Sink recording into `timeline`
    pub fn new(timeline: Timeline) -> Self {
        Self { timeline }
    }
}

impl LogSink for RecordingLog {
    fn add(&self, level: LogLevel, message: &str) {
        let event = match level {
            LogLevel::Error => format!("log: error {}", message),
            _ => format!("log: {}", message),
        };
        record(&self.timeline, event);
    }
}

/// Clock advancing by a fixed step on every reading
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    step: Duration,
    readings: Mutex<u32>,
}

impl ManualClock {
    /// Clock advancing by `step` per reading
    pub fn new(step: Duration) -> Self {
        Self {
            start: Instant::now(),
            step,
            readings: Mutex::new(0),
        }
    }

    /// Time passed between the first and the latest reading
    pub fn elapsed(&self) -> Duration {
        let readings = *self.readings.lock().unwrap_or_else(PoisonError::into_inner);
        self.step * readings.saturating_sub(1)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut readings = self.readings.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.start + self.step * *readings;
        *readings += 1;
        now
    }
}
