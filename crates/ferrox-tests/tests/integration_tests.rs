//! Integration tests for Ferrox
//!
//! These tests drive a full session against the in-memory server of
//! `ferrox_tests::test_utils` and against loopback directories, checking the
//! order in which the session talks to its backend, log and UI.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use ferrox_config::{EngineConfig, SessionConfig, TunnelConfig};
use ferrox_session::{LoopbackConnector, Session};
use ferrox_sync::{ChecklistAction, SyncMode, SyncParams, SynchronizeEngine};
use ferrox_tests::create_tree;
use ferrox_tests::test_utils::{
    assert_in_order, clear, count, events, timeline, ManualClock, MockConnector, MockServer,
    RecordingLog, ScriptedUi, Timeline,
};
use ferrox_types::{
    CopyParam, DeleteParams, Error, FileItem, FsProtocol, QueryAnswer, RemoteProperties,
    ReopenParams, SessionStatus, UnattendedUi,
};
use rstest::rstest;
use tempfile::TempDir;

struct Fixture {
    timeline: Timeline,
    server: MockServer,
    ui: Arc<ScriptedUi>,
    connector: Rc<MockConnector>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_ui(ScriptedUi::new)
    }

    fn with_ui(ui: impl FnOnce(Timeline) -> ScriptedUi) -> Self {
        let timeline = timeline();
        let server = MockServer::new(timeline.clone());
        server.add_file("/data/a.txt", 10, Utc::now());
        server.add_file("/data/b.txt", 20, Utc::now());
        let connector = Rc::new(MockConnector::new(server.clone()));
        Self {
            ui: Arc::new(ui(timeline.clone())),
            timeline,
            server,
            connector,
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            host_name: "files.example.com".to_string(),
            user_name: "user".to_string(),
            remote_directory: "/data".to_string(),
            ..SessionConfig::default()
        }
    }

    fn session_with(&self, config: SessionConfig, engine: EngineConfig) -> Session {
        Session::new(config, engine, self.connector.clone(), self.ui.clone())
            .with_log_sink(Arc::new(RecordingLog::new(self.timeline.clone())))
    }

    fn session(&self) -> Session {
        self.session_with(Self::config(), EngineConfig::default())
    }

    fn opened(&self) -> Session {
        let mut session = self.session();
        session.open().unwrap();
        clear(&self.timeline);
        session
    }
}

fn names(session: &Session) -> Vec<String> {
    session
        .files()
        .files()
        .iter()
        .filter(|file| !file.is_parent_directory())
        .map(|file| file.file_name.clone())
        .collect()
}

fn local_file(directory: &TempDir, name: &str) -> PathBuf {
    let path = directory.path().join(name);
    std::fs::write(&path, b"payload").unwrap();
    path
}

#[test]
fn test_open_enters_remote_directory_with_one_listing() {
    let fixture = Fixture::new();
    let mut session = fixture.session();

    session.open().unwrap();

    assert_eq!(session.status(), SessionStatus::Opened);
    assert_eq!(session.current_directory().unwrap(), "/data");
    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 1);
    assert_eq!(names(&session), vec!["a.txt", "b.txt"]);
    assert_in_order(
        &fixture.timeline,
        &[
            "connector: connect_shell files.example.com",
            "connector: bind_shell Sftp",
            "backend: change_directory /data",
            "backend: read_current_directory",
            "ui: directory_changed /data",
            "backend: read_directory /data",
            "log: Session started.",
        ],
    );
}

#[test]
fn test_upload_refreshes_target_listing_at_transaction_end() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();
    let local = TempDir::new().unwrap();
    let file = local_file(&local, "c.txt");

    let completed = session
        .copy_to_remote(&[file], "/data", &CopyParam::default())
        .unwrap();

    assert!(completed);
    assert!(fixture.server.exists("/data/c.txt"));
    assert_in_order(
        &fixture.timeline,
        &[
            "log: Transaction level 1 started",
            "backend: copy_to_remote /data",
            "log: Directory \"/data\" modified",
            "backend: read_directory /data",
            "ui: directory_read /data reload=true",
            "log: Transaction level 1 finished",
        ],
    );
    assert_eq!(names(&session), vec!["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn test_cached_listing_is_served_without_backend_read() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();

    session.read_directory(false, false).unwrap();

    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 0);
    assert_in_order(&fixture.timeline, &["ui: directory_read /data reload=false"]);
}

#[test]
fn test_delete_invalidates_parent_listing() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();

    let completed = session
        .delete_files(&[FileItem::new("a.txt")], DeleteParams::default())
        .unwrap();

    assert!(completed);
    assert!(!fixture.server.exists("/data/a.txt"));
    assert_in_order(
        &fixture.timeline,
        &[
            "log: Directory \"/data\" modified",
            "backend: delete_file /data/a.txt",
            "backend: read_directory /data",
        ],
    );
    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 1);
    assert_eq!(names(&session), vec!["b.txt"]);
}

#[test]
fn test_rename_invalidates_parent_listing() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();

    session
        .rename_file(&FileItem::new("a.txt"), "renamed.txt", false)
        .unwrap();

    assert!(fixture.server.exists("/data/renamed.txt"));
    assert_in_order(
        &fixture.timeline,
        &[
            "log: Directory \"/data\" modified",
            "backend: rename_file /data/a.txt /data/renamed.txt",
            "backend: read_directory /data",
        ],
    );
    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 1);
    let listed = names(&session);
    assert!(listed.contains(&"renamed.txt".to_string()));
    assert!(!listed.contains(&"a.txt".to_string()));
}

#[test]
fn test_change_properties_invalidates_parent_listing() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();
    let properties = RemoteProperties {
        rights: Some(0o600),
        ..RemoteProperties::default()
    };

    let completed = session
        .change_files_properties(&[FileItem::new("a.txt")], &properties)
        .unwrap();

    assert!(completed);
    assert_in_order(
        &fixture.timeline,
        &[
            "log: Directory \"/data\" modified",
            "backend: change_file_properties /data/a.txt",
            "backend: read_directory /data",
        ],
    );
    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 1);
    assert_eq!(session.files().find("a.txt").and_then(|file| file.rights), Some(0o600));
}

#[test]
fn test_move_invalidates_source_and_target_listings() {
    let fixture = Fixture::new();
    fixture.server.add_directory("/archive");
    let mut session = fixture.opened();
    session.change_directory("/archive").unwrap();
    session.change_directory("/data").unwrap();
    clear(&fixture.timeline);

    let moved = session
        .move_files(&[FileItem::new("a.txt")], "/archive", "*")
        .unwrap();

    assert!(moved);
    assert!(fixture.server.exists("/archive/a.txt"));
    assert_eq!(count(&fixture.timeline, "backend: read_directory /data"), 1);
    assert_eq!(names(&session), vec!["b.txt"]);

    session.change_directory("/archive").unwrap();
    assert_eq!(count(&fixture.timeline, "backend: read_directory /archive"), 1);
    assert_eq!(names(&session), vec!["a.txt"]);
}

#[test]
fn test_move_forgets_directory_changes_into_moved_directory() {
    let fixture = Fixture::new();
    fixture.server.add_directory("/src/sub");
    fixture.server.add_directory("/dst");
    let mut session = fixture.opened();
    session.change_directory("/src").unwrap();
    session.change_directory("sub").unwrap();
    session.change_directory("/").unwrap();
    let remembered = |session: &Session| {
        session
            .directory_changes_cache()
            .and_then(|cache| cache.get_directory_change("/src", "sub"))
    };
    assert_eq!(remembered(&session), Some("/src/sub".to_string()));

    let moved = session
        .move_files(&[FileItem::new("/src/sub")], "/dst", "*")
        .unwrap();

    assert!(moved);
    assert!(fixture.server.exists("/dst/sub"));
    assert!(!fixture.server.exists("/src/sub"));
    assert_eq!(remembered(&session), None);

    session.change_directory("/src").unwrap();
    clear(&fixture.timeline);
    let _ = session.change_directory("sub");
    assert_eq!(count(&fixture.timeline, "log: Cached directory change"), 0);
    assert_eq!(count(&fixture.timeline, "backend: change_directory sub"), 1);
}

#[test]
fn test_locked_home_is_presented_as_root() {
    let fixture = Fixture::new();
    fixture
        .server
        .add_file("/home/user/docs/notes.txt", 5, Utc::now());
    let config = SessionConfig {
        lock_in_home: true,
        remote_directory: String::new(),
        ..Fixture::config()
    };
    let mut session = fixture.session_with(config, EngineConfig::default());
    session.open().unwrap();

    assert_eq!(session.lock_directory(), "/home/user");
    assert_eq!(session.current_directory().unwrap(), "/");
    clear(&fixture.timeline);

    session.set_current_directory("/docs").unwrap();

    assert_eq!(session.current_directory().unwrap(), "/docs");
    assert_in_order(
        &fixture.timeline,
        &[
            "backend: change_directory /home/user/docs",
            "ui: directory_changed /docs",
            "backend: read_directory /home/user/docs",
        ],
    );
    assert_eq!(names(&session), vec!["notes.txt"]);
}

#[test]
fn test_fatal_failure_while_sizing_download_is_kept() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();
    let local = TempDir::new().unwrap();
    fixture
        .server
        .fail("read_file", Error::fatal("Connection reset by peer"), 1);
    let copy_param = CopyParam {
        calculate_size: true,
        ..CopyParam::default()
    };

    let error = session
        .copy_to_local(&[FileItem::new("a.txt")], local.path(), &copy_param)
        .unwrap_err();

    assert!(error.is_fatal());
    assert!(!session.is_active());
    assert!(
        error.details().iter().any(|detail| detail == "Connection reset by peer"),
        "{:?}",
        error
    );
    assert!(!error.details().iter().any(|detail| detail.contains("not connected")));
    assert_eq!(count(&fixture.timeline, "backend: copy_to_local"), 0);
}

#[test]
fn test_nested_transactions_refresh_once_after_outermost_end() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();

    session.begin_transaction();
    session.begin_transaction();
    session.create_directory("first", None).unwrap();
    session.create_directory("second", None).unwrap();
    session.end_transaction().unwrap();
    assert_eq!(session.transaction_depth(), 1);
    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 0);

    session.end_transaction().unwrap();
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(count(&fixture.timeline, "backend: read_directory"), 1);
    assert_eq!(names(&session), vec!["a.txt", "b.txt", "first", "second"]);
}

#[test]
fn test_unbalanced_transaction_end_is_an_error() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();

    assert!(session.end_transaction().is_err());
}

#[rstest]
#[case::skip(QueryAnswer::Skip, true, true, false)]
#[case::retry(QueryAnswer::Retry, true, false, false)]
#[case::abort(QueryAnswer::Abort, false, true, true)]
fn test_batch_failure_answers(
    #[case] answer: QueryAnswer,
    #[case] completed: bool,
    #[case] first_remains: bool,
    #[case] second_remains: bool,
) {
    let fixture = Fixture::new();
    let mut session = fixture.opened();
    fixture
        .server
        .fail("delete_file", Error::command("Permission denied"), 1);
    fixture.ui.script(&[answer]);

    let result = session
        .delete_files(
            &[FileItem::new("a.txt"), FileItem::new("b.txt")],
            DeleteParams::default(),
        )
        .unwrap();

    assert_eq!(result, completed);
    assert_eq!(fixture.ui.queries(), 1);
    assert_eq!(fixture.server.exists("/data/a.txt"), first_remains);
    assert_eq!(fixture.server.exists("/data/b.txt"), second_remains);
}

#[test]
fn test_skip_all_answers_later_failures_without_asking() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();
    fixture
        .server
        .fail("delete_file", Error::command("Permission denied"), 2);
    fixture.ui.script(&[QueryAnswer::All]);

    let completed = session
        .delete_files(
            &[FileItem::new("a.txt"), FileItem::new("b.txt")],
            DeleteParams::default(),
        )
        .unwrap();

    assert!(completed);
    assert_eq!(fixture.ui.queries(), 1);
    assert!(fixture.server.exists("/data/a.txt"));
    assert!(fixture.server.exists("/data/b.txt"));
}

#[test]
fn test_fatal_error_from_callback_surfaces_once() {
    let fixture = Fixture::new();
    let mut session = fixture.opened();
    fixture
        .ui
        .fail_directory_read(Error::fatal("File panel crashed"));

    let error = session.read_directory(false, false).unwrap_err();
    assert!(error.is_fatal());
    assert_eq!(error.to_string(), Error::fatal("File panel crashed").to_string());

    session.read_directory(false, false).unwrap();
    assert_eq!(count(&fixture.timeline, "ui: directory_read /data"), 2);
}

#[test]
fn test_refused_connection_leaves_session_closed() {
    let fixture = Fixture::new();
    fixture.connector.fail_connections(1);
    let mut session = fixture.session();

    let error = session.open().unwrap_err();

    assert!(error.is_fatal());
    assert_eq!(session.status(), SessionStatus::Closed);
    assert!(!session.is_active());
    assert_eq!(count(&fixture.timeline, "backend:"), 0);

    session.open().unwrap();
    assert_eq!(session.status(), SessionStatus::Opened);
}

#[test]
fn test_failed_connection_closes_tunnel() {
    let fixture = Fixture::new();
    fixture.connector.enable_tunnels();
    fixture.connector.fail_connections(1);
    let config = SessionConfig {
        tunnel: TunnelConfig {
            enabled: true,
            host_name: "gateway.example.com".to_string(),
            user_name: "relay".to_string(),
            ..TunnelConfig::default()
        },
        ..Fixture::config()
    };
    let mut session = fixture.session_with(config, EngineConfig::default());

    let error = session.open().unwrap_err();

    assert!(error.is_fatal());
    assert_eq!(session.status(), SessionStatus::Closed);
    assert_eq!(session.tunnel_local_port(), None);
    assert_eq!(count(&fixture.timeline, "tunnel: close"), 1);
    assert_in_order(
        &fixture.timeline,
        &[
            "connector: open_tunnel L",
            "connector: connect_shell 127.0.0.1",
            "log: Closing tunnel",
            "tunnel: close",
        ],
    );
}

#[test]
fn test_reconnect_gives_up_after_timeout() {
    let fixture = Fixture::with_ui(|timeline| ScriptedUi::new(timeline).answering(QueryAnswer::Retry));
    let engine = EngineConfig {
        session_reopen_auto_ms: 0,
        session_reopen_timeout_ms: 5000,
        ..EngineConfig::default()
    };
    let clock = Arc::new(ManualClock::new(Duration::from_secs(2)));
    let mut session = fixture
        .session_with(Fixture::config(), engine)
        .with_clock(clock.clone());
    session.open().unwrap();
    let local = TempDir::new().unwrap();
    let file = local_file(&local, "c.txt");
    fixture
        .server
        .fail("copy_to_remote", Error::fatal("Connection reset by peer"), 1);
    fixture
        .server
        .fail("open", Error::fatal("Network error: Connection timed out"), usize::MAX);

    let mut error = session
        .copy_to_remote(&[file], "/data", &CopyParam::default())
        .unwrap_err();
    assert!(error.is_fatal());
    assert!(!session.is_active());

    let reopened = session
        .query_reopen(&mut error, ReopenParams::default(), None)
        .unwrap();
    assert!(!reopened);
    assert_eq!(fixture.ui.queries(), 3);
    assert!(clock.elapsed() >= Duration::from_millis(5000));
    assert_in_order(
        &fixture.timeline,
        &["log: Connection was lost, asking what to do.", "ui: query", "backend: open"],
    );

    let again = session
        .query_reopen(&mut error, ReopenParams::default(), None)
        .unwrap();
    assert!(!again);
    assert_eq!(fixture.ui.queries(), 3);
}

#[test]
fn test_reconnect_restores_directory() {
    let fixture = Fixture::with_ui(|timeline| ScriptedUi::new(timeline).answering(QueryAnswer::Retry));
    let mut session = fixture.session();
    session.open().unwrap();
    fixture
        .server
        .fail("read_directory", Error::fatal("Connection reset by peer"), 1);

    let mut error = session.reload_directory().unwrap_err();
    assert!(!session.is_active());

    let reopened = session
        .query_reopen(&mut error, ReopenParams::default(), None)
        .unwrap();
    assert!(reopened);
    assert!(session.is_active());
    assert_eq!(session.current_directory().unwrap(), "/data");
    assert_eq!(fixture.ui.queries(), 1);
}

#[test]
fn test_command_runs_on_command_session_inside_transaction() {
    let fixture = Fixture::new();
    let config = SessionConfig {
        protocol: FsProtocol::Ftp,
        ..Fixture::config()
    };
    let mut session = fixture.session_with(config, EngineConfig::default());
    session.open().unwrap();
    clear(&fixture.timeline);

    session.begin_transaction();
    let mut lines = Vec::new();
    let mut output = |line: &str, _error: bool| lines.push(line.to_string());
    session.any_command("ls -la", &mut output).unwrap();
    assert!(session.command_session_opened());
    session.end_transaction().unwrap();

    assert_eq!(lines, vec!["/data$ ls -la".to_string()]);
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(count(&fixture.timeline, "connector: bind_shell Scp"), 1);
    assert_in_order(
        &fixture.timeline,
        &[
            "log: Opening command session.",
            "backend: any_command ls -la",
            "backend: change_directory /data",
        ],
    );
    assert!(!events(&fixture.timeline)
        .iter()
        .any(|event| event.starts_with("log: error")));
}

fn loopback_session(remote: &TempDir) -> Session {
    let mut session = Session::new(
        SessionConfig::default(),
        EngineConfig::default(),
        Rc::new(LoopbackConnector::new(remote.path())),
        Arc::new(UnattendedUi),
    );
    session.open().unwrap();
    session
}

fn sync_params() -> SyncParams {
    SyncParams {
        no_confirmation: true,
        ..SyncParams::default()
    }
}

#[test]
fn test_collect_is_deterministic() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let older = Utc.timestamp_opt(1_000_000_000, 0).unwrap();
    let newer = Utc.timestamp_opt(1_000_000_600, 0).unwrap();
    create_tree(
        local.path(),
        &[("zeta.txt", "z"), ("alpha/one.txt", "1"), ("shared.txt", "local")],
        newer,
    )
    .unwrap();
    create_tree(
        remote.path(),
        &[("beta/two.txt", "2"), ("shared.txt", "remote"), ("gamma.txt", "g")],
        older,
    )
    .unwrap();
    let mut session = loopback_session(&remote);
    let mut engine = SynchronizeEngine::new(&mut session);

    let first = engine
        .collect(local.path(), "/", SyncMode::Both, &CopyParam::default(), sync_params(), None)
        .unwrap();
    let second = engine
        .collect(local.path(), "/", SyncMode::Both, &CopyParam::default(), sync_params(), None)
        .unwrap();

    assert_eq!(first, second);
    let listed: Vec<(&str, ChecklistAction)> = first
        .items()
        .iter()
        .map(|item| (item.file_name(), item.action))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("alpha", ChecklistAction::UploadNew),
            ("beta", ChecklistAction::DownloadNew),
            ("gamma.txt", ChecklistAction::DownloadNew),
            ("shared.txt", ChecklistAction::UploadUpdate),
            ("zeta.txt", ChecklistAction::UploadNew),
        ]
    );
}

#[test]
fn test_synchronize_both_ways_converges() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let time = Utc.timestamp_opt(1_000_000_000, 0).unwrap();
    create_tree(local.path(), &[("docs/readme.md", "hello"), ("notes.txt", "n")], time).unwrap();
    create_tree(remote.path(), &[("images/logo.svg", "<svg/>"), ("remote.txt", "r")], time).unwrap();
    let mut session = loopback_session(&remote);
    let copy_param = CopyParam::default();
    let mut engine = SynchronizeEngine::new(&mut session);

    let checklist = engine
        .collect(local.path(), "/", SyncMode::Both, &copy_param, sync_params(), None)
        .unwrap();
    assert_eq!(checklist.checked_count(), 4);
    engine.apply(&checklist, &copy_param, sync_params()).unwrap();

    let again = engine
        .collect(local.path(), "/", SyncMode::Both, &copy_param, sync_params(), None)
        .unwrap();
    assert!(again.is_empty(), "left over: {:?}", again.items());
    assert!(local.path().join("images/logo.svg").is_file());
    assert!(remote.path().join("docs/readme.md").is_file());
}

#[test]
fn test_mirror_replaces_newer_remote_file() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    create_tree(local.path(), &[("page.html", "old")], Utc.timestamp_opt(1_000_000_000, 0).unwrap()).unwrap();
    create_tree(remote.path(), &[("page.html", "new")], Utc.timestamp_opt(1_000_000_600, 0).unwrap()).unwrap();
    let mut session = loopback_session(&remote);
    let mut engine = SynchronizeEngine::new(&mut session);

    let plain = engine
        .collect(local.path(), "/", SyncMode::Remote, &CopyParam::default(), sync_params(), None)
        .unwrap();
    assert!(plain.is_empty());

    let mirror = SyncParams {
        mirror: true,
        ..sync_params()
    };
    let checklist = engine
        .collect(local.path(), "/", SyncMode::Remote, &CopyParam::default(), mirror, None)
        .unwrap();
    assert_eq!(checklist.len(), 1);
    assert_eq!(checklist.items()[0].action, ChecklistAction::UploadUpdate);
}
