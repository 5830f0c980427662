//! Background daemon serving the board API over a Unix socket.
//!
//! The daemon provides:
//! - A single writer in front of the store
//! - Membership checks before any mutation
//! - Activity logging and event broadcast after each commit
//! - Live board subscriptions on long-lived connections

use crate::events::{BoardEvent, Broadcaster, Hub, publish_move};
use crate::protocol::{Request, Response};
use crate::storage::KANBAN_DIR;
use crate::store::Store;
use crate::types::{Action, Role};
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;

/// Socket file name within the .kanban directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .kanban directory.
const PID_FILE: &str = "daemon.pid";

/// How often the main loop checks the shutdown flag while idle.
const SHUTDOWN_POLL_MS: u64 = 250;

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .kanban
    pub root: PathBuf,
}

impl DaemonConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(KANBAN_DIR).join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(KANBAN_DIR).join(PID_FILE)
    }
}

type RequestSender = mpsc::Sender<(Request, mpsc::Sender<Response>)>;

/// The board daemon.
pub struct Daemon {
    config: DaemonConfig,
    store: Store,
    hub: Arc<Hub>,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = Store::open(&config.root).context("Failed to open store")?;
        Ok(Self::with_store(config, store))
    }

    /// Create a daemon around an already opened store.
    pub fn with_store(config: DaemonConfig, store: Store) -> Self {
        let hub = Arc::new(Hub::new(store.config().event_capacity));

        Self {
            config,
            store,
            hub,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The event hub fed by this daemon.
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Run the daemon until a shutdown request arrives.
    pub async fn run(&mut self) -> Result<()> {
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;

        log::info!("Daemon listening on {:?}", socket_path);

        let (tx, mut rx) = mpsc::channel::<(Request, mpsc::Sender<Response>)>(100);

        let shutdown_flag = Arc::clone(&self.shutdown);
        let hub = Arc::clone(&self.hub);
        let acceptor = tokio::spawn(async move {
            Self::accept_connections(listener, tx, hub, shutdown_flag).await;
        });

        let mut poll = interval(Duration::from_millis(SHUTDOWN_POLL_MS));

        loop {
            tokio::select! {
                Some((request, response_tx)) = rx.recv() => {
                    let response = self.handle_request(request);
                    let _ = response_tx.send(response).await;
                }

                _ = poll.tick() => {}
            }

            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Daemon shutting down");
                break;
            }
        }

        acceptor.abort();
        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections in a background task, one task per client.
    async fn accept_connections(listener: UnixListener, tx: RequestSender, hub: Arc<Hub>, shutdown: Arc<AtomicBool>) {
        let mut poll = interval(Duration::from_millis(SHUTDOWN_POLL_MS));

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let tx = tx.clone();
                        let hub = Arc::clone(&hub);
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, tx, hub).await {
                                log::warn!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },

                _ = poll.tick() => {}
            }

            if shutdown.load(Ordering::Relaxed) {
                break;
            }
        }
    }

    /// Handle a single client connection.
    async fn handle_connection(stream: UnixStream, tx: RequestSender, hub: Arc<Hub>) -> Result<()> {
        let (read_half, mut writer) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.is_empty() {
                continue;
            }

            let request: Request = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    write_response(&mut writer, &Response::error(format!("Failed to parse request: {}", e))).await?;
                    continue;
                }
            };

            let is_shutdown = matches!(request, Request::Shutdown);

            let (resp_tx, mut resp_rx) = mpsc::channel(1);
            tx.send((request, resp_tx))
                .await
                .context("Failed to send request to daemon")?;

            let Some(response) = resp_rx.recv().await else {
                continue;
            };

            if let Response::Subscribed { board_id } = &response {
                let events = hub.subscribe(board_id);
                write_response(&mut writer, &response).await?;
                Self::stream_events(&mut lines, &mut writer, events, board_id).await;
                hub.prune(board_id);
                return Ok(());
            }

            write_response(&mut writer, &response).await?;

            if is_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Forward board events to a subscribed client until it goes away.
    ///
    /// The receiver is consumed so that once this returns the subscription
    /// no longer counts toward the board's group.
    async fn stream_events(
        lines: &mut Lines<BufReader<OwnedReadHalf>>,
        writer: &mut OwnedWriteHalf,
        mut events: broadcast::Receiver<BoardEvent>,
        board_id: &str,
    ) {
        let group = Hub::group_name(board_id);
        log::debug!("Client subscribed to {}", group);
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        if write_response(writer, &Response::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Subscriber on {} lagged, skipped {} event(s)", group, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },

                // Subscribers send nothing more; EOF or an error means they left
                line = lines.next_line() => {
                    if !matches!(line, Ok(Some(_))) {
                        break;
                    }
                }
            }
        }
        log::debug!("Subscriber on {} disconnected", group);
    }

    /// Resolve the project behind a request and check the user's role in it.
    fn require(
        &self,
        project: Result<Option<String>>,
        id: &str,
        user: &str,
        allowed: fn(&Role) -> bool,
    ) -> std::result::Result<String, Response> {
        let project_id = match project {
            Ok(Some(project_id)) => project_id,
            Ok(None) => return Err(Response::NotFound { id: id.to_string() }),
            Err(e) => return Err(Response::from_report(&e)),
        };

        match self.store.member(&project_id, user) {
            Ok(Some(member)) if allowed(&member.role) => Ok(project_id),
            Ok(Some(member)) => Err(Response::forbidden(format!(
                "role '{}' may not perform this operation in project {}",
                member.role.as_str(),
                project_id
            ))),
            Ok(None) => Err(Response::forbidden(format!(
                "user '{}' is not a member of project {}",
                user, project_id
            ))),
            Err(e) => Err(Response::from_report(&e)),
        }
    }

    fn project_of_board(&self, board_id: &str) -> Result<Option<String>> {
        Ok(self.store.get_board(board_id)?.map(|b| b.project_id))
    }

    /// Record activity after a commit; failures are logged, not returned.
    fn log_activity(&mut self, user: &str, task_id: &str, action: Action, description: &str) {
        if let Err(e) = self.store.record_activity(user, task_id, action, description) {
            log::warn!("Failed to record activity for {}: {}", task_id, e);
        }
    }

    /// Handle a single request.
    fn handle_request(&mut self, request: Request) -> Response {
        match request {
            Request::CreateProject {
                user,
                name,
                description,
            } => match self.store.create_project(&name, description.as_deref(), &user) {
                Ok(project) => Response::Project { project },
                Err(e) => Response::from_report(&e),
            },

            Request::AddMember {
                user,
                project_id,
                member,
                role,
            } => {
                if let Err(resp) = self.require(Ok(Some(project_id.clone())), &project_id, &user, Role::can_manage) {
                    return resp;
                }
                match self.store.add_member(&project_id, &member, role) {
                    Ok(member) => Response::Member { member },
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::CreateBoard { user, project_id, name } => {
                if let Err(resp) =
                    self.require(Ok(Some(project_id.clone())), &project_id, &user, Role::can_edit_boards)
                {
                    return resp;
                }
                match self.store.create_board(&project_id, &name) {
                    Ok(board) => Response::Board { board },
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::CreateColumn {
                user,
                board_id,
                name,
                wip_limit,
            } => {
                if let Err(resp) =
                    self.require(self.project_of_board(&board_id), &board_id, &user, Role::can_edit_boards)
                {
                    return resp;
                }
                match self.store.create_column(&board_id, &name, wip_limit) {
                    Ok(column) => Response::Column { column },
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::CreateTask {
                user,
                column_id,
                title,
                description,
                priority,
            } => {
                if let Err(resp) = self.require(
                    self.store.project_of_column(&column_id),
                    &column_id,
                    &user,
                    Role::can_edit_tasks,
                ) {
                    return resp;
                }
                match self
                    .store
                    .create_task(&column_id, &title, description.as_deref(), priority)
                {
                    Ok(task) => {
                        self.log_activity(&user, &task.id, Action::Created, &format!("Created task '{}'", task.title));
                        if let Ok(Some(column)) = self.store.get_column(&task.column_id) {
                            self.hub
                                .publish(&column.board_id, &BoardEvent::task_create(&task, &user));
                        }
                        Response::Task { task }
                    }
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::MoveTask {
                user,
                task_id,
                column_id,
                order,
            } => {
                if let Err(resp) =
                    self.require(self.store.project_of_task(&task_id), &task_id, &user, Role::can_edit_tasks)
                {
                    return resp;
                }
                if let Err(resp) = self.require(
                    self.store.project_of_column(&column_id),
                    &column_id,
                    &user,
                    Role::can_edit_tasks,
                ) {
                    return resp;
                }
                match self.store.move_task(&task_id, &column_id, order) {
                    Ok(outcome) => {
                        let description = format!(
                            "Moved task '{}' to column {} at position {}",
                            outcome.task.title, outcome.task.column_id, outcome.task.order
                        );
                        self.log_activity(&user, &outcome.task.id, Action::Moved, &description);
                        publish_move(self.hub.as_ref(), &outcome, &user);
                        Response::Moved { outcome }
                    }
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::DeleteTask { user, task_id } => {
                if let Err(resp) =
                    self.require(self.store.project_of_task(&task_id), &task_id, &user, Role::can_edit_tasks)
                {
                    return resp;
                }
                let board_id = self
                    .store
                    .get_task(&task_id)
                    .ok()
                    .flatten()
                    .and_then(|task| self.store.get_column(&task.column_id).ok().flatten())
                    .map(|column| column.board_id);
                match self.store.delete_task(&task_id) {
                    Ok(task) => {
                        self.log_activity(&user, &task.id, Action::Deleted, &format!("Deleted task '{}'", task.title));
                        if let Some(board_id) = board_id {
                            self.hub.publish(&board_id, &BoardEvent::task_delete(&task, &user));
                        }
                        Response::Ok
                    }
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::GetTask { user, id } => {
                if let Err(resp) = self.require(self.store.project_of_task(&id), &id, &user, |_| true) {
                    return resp;
                }
                match self.store.get_task(&id) {
                    Ok(Some(task)) => Response::Task { task },
                    Ok(None) => Response::NotFound { id },
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::ListColumn { user, column_id } => {
                if let Err(resp) = self.require(self.store.project_of_column(&column_id), &column_id, &user, |_| true) {
                    return resp;
                }
                match self.store.list_tasks(&column_id) {
                    Ok(tasks) => Response::Tasks { tasks },
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::RepairColumn { user, column_id } => {
                if let Err(resp) = self.require(
                    self.store.project_of_column(&column_id),
                    &column_id,
                    &user,
                    Role::can_edit_tasks,
                ) {
                    return resp;
                }
                match self.store.repair_column(&column_id) {
                    Ok(rewritten) => {
                        if rewritten > 0
                            && let Ok(Some(column)) = self.store.get_column(&column_id)
                        {
                            self.hub.publish(
                                &column.board_id,
                                &BoardEvent::column_repair(&column_id, rewritten, &user),
                            );
                        }
                        Response::Repaired { column_id, rewritten }
                    }
                    Err(e) => Response::from_report(&e),
                }
            }

            Request::Subscribe { user, board_id } => {
                match self.require(self.project_of_board(&board_id), &board_id, &user, |_| true) {
                    Ok(_) => Response::Subscribed { board_id },
                    Err(resp) => resp,
                }
            }

            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::Ok
            }

            Request::Ping => Response::Pong,
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Check if a daemon is running for the given store path.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if !socket_path.exists() {
        return false;
    }

    if let Ok(pid_str) = fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // signal 0 only checks that the process exists
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }

    // Stale socket, clean up
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();
    false
}

/// Start the daemon as a background process.
pub fn start_daemon(root: &Path) -> Result<()> {
    use std::process::Command;

    let exe = std::env::current_exe().context("Failed to get current executable")?;

    Command::new(exe)
        .args(["--dir", root.to_str().unwrap_or("."), "daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    std::thread::sleep(Duration::from_millis(100));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        daemon: Daemon,
        board_id: String,
        todo: String,
        done: String,
    }

    /// Store with one project owned by alice, bob as member, vic as viewer.
    fn setup() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let mut store = Store::init(&root).unwrap();
        let project = store.create_project("Daemon", None, "alice").unwrap();
        store.add_member(&project.id, "bob", Role::Member).unwrap();
        store.add_member(&project.id, "vic", Role::Viewer).unwrap();
        let board = store.create_board(&project.id, "Board").unwrap();
        let todo = store.create_column(&board.id, "To Do", None).unwrap();
        let done = store.create_column(&board.id, "Done", None).unwrap();
        drop(store);

        Fixture {
            _temp_dir: temp_dir,
            daemon: Daemon::new(DaemonConfig::new(&root)).unwrap(),
            board_id: board.id,
            todo: todo.id,
            done: done.id,
        }
    }

    fn create_task(f: &mut Fixture, user: &str, title: &str) -> Response {
        f.daemon.handle_request(Request::CreateTask {
            user: user.to_string(),
            column_id: f.todo.clone(),
            title: title.to_string(),
            description: None,
            priority: Priority::Medium,
        })
    }

    #[test]
    fn test_daemon_config() {
        let config = DaemonConfig::new("/test/path");
        assert_eq!(config.socket_path(), PathBuf::from("/test/path/.kanban/daemon.sock"));
        assert_eq!(config.pid_path(), PathBuf::from("/test/path/.kanban/daemon.pid"));
    }

    #[test]
    fn test_is_daemon_running_false() {
        let f = setup();
        assert!(!is_daemon_running(&f.daemon.config.root));
    }

    #[test]
    fn test_member_can_create_and_move() {
        let mut f = setup();
        let Response::Task { task } = create_task(&mut f, "bob", "Write tests") else {
            panic!("expected task");
        };
        assert_eq!(task.order, 0);

        let response = f.daemon.handle_request(Request::MoveTask {
            user: "bob".to_string(),
            task_id: task.id.clone(),
            column_id: f.done.clone(),
            order: 0,
        });
        let Response::Moved { outcome } = response else {
            panic!("expected move");
        };
        assert_eq!(outcome.task.column_id, f.done);
        assert_eq!(outcome.source_column_id, f.todo);
    }

    #[test]
    fn test_viewer_cannot_create() {
        let mut f = setup();
        assert!(matches!(create_task(&mut f, "vic", "Nope"), Response::Forbidden { .. }));
    }

    #[test]
    fn test_stranger_cannot_list() {
        let mut f = setup();
        let response = f.daemon.handle_request(Request::ListColumn {
            user: "mallory".to_string(),
            column_id: f.todo.clone(),
        });
        assert!(matches!(response, Response::Forbidden { .. }));
    }

    #[test]
    fn test_viewer_can_list() {
        let mut f = setup();
        create_task(&mut f, "bob", "One");
        let response = f.daemon.handle_request(Request::ListColumn {
            user: "vic".to_string(),
            column_id: f.todo.clone(),
        });
        assert!(matches!(response, Response::Tasks { tasks } if tasks.len() == 1));
    }

    #[test]
    fn test_move_unknown_task_is_not_found() {
        let mut f = setup();
        let response = f.daemon.handle_request(Request::MoveTask {
            user: "bob".to_string(),
            task_id: "tk-missing".to_string(),
            column_id: f.done.clone(),
            order: 0,
        });
        assert!(matches!(response, Response::NotFound { id } if id == "tk-missing"));
    }

    #[test]
    fn test_negative_order_is_invalid() {
        let mut f = setup();
        let Response::Task { task } = create_task(&mut f, "bob", "Task") else {
            panic!("expected task");
        };
        let response = f.daemon.handle_request(Request::MoveTask {
            user: "bob".to_string(),
            task_id: task.id,
            column_id: f.done.clone(),
            order: -1,
        });
        assert!(matches!(response, Response::Invalid { .. }));
    }

    #[test]
    fn test_move_publishes_event_and_logs_activity() {
        let mut f = setup();
        let mut rx = f.daemon.hub().subscribe(&f.board_id);
        let Response::Task { task } = create_task(&mut f, "bob", "Ship it") else {
            panic!("expected task");
        };
        assert!(matches!(rx.try_recv().unwrap(), BoardEvent::TaskCreate { .. }));

        f.daemon.handle_request(Request::MoveTask {
            user: "bob".to_string(),
            task_id: task.id.clone(),
            column_id: f.done.clone(),
            order: 0,
        });

        match rx.try_recv().unwrap() {
            BoardEvent::TaskMove {
                task_id,
                destination_column_id,
                user,
                ..
            } => {
                assert_eq!(task_id, task.id);
                assert_eq!(destination_column_id, f.done);
                assert_eq!(user.id, "bob");
            }
            other => panic!("unexpected event {:?}", other),
        }

        let activity = f.daemon.store.activity(Some(&task.id), 10).unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].action, Action::Moved);
    }

    #[test]
    fn test_delete_publishes_event() {
        let mut f = setup();
        let Response::Task { task } = create_task(&mut f, "bob", "Temp") else {
            panic!("expected task");
        };
        let mut rx = f.daemon.hub().subscribe(&f.board_id);

        let response = f.daemon.handle_request(Request::DeleteTask {
            user: "alice".to_string(),
            task_id: task.id,
        });

        assert!(matches!(response, Response::Ok));
        assert!(matches!(rx.try_recv().unwrap(), BoardEvent::TaskDelete { .. }));
    }

    #[test]
    fn test_only_managers_add_members() {
        let mut f = setup();
        let project_id = f.daemon.store.project_of_column(&f.todo).unwrap().unwrap();

        let denied = f.daemon.handle_request(Request::AddMember {
            user: "bob".to_string(),
            project_id: project_id.clone(),
            member: "eve".to_string(),
            role: Role::Admin,
        });
        assert!(matches!(denied, Response::Forbidden { .. }));

        let allowed = f.daemon.handle_request(Request::AddMember {
            user: "alice".to_string(),
            project_id,
            member: "eve".to_string(),
            role: Role::Member,
        });
        assert!(matches!(allowed, Response::Member { .. }));
    }

    #[test]
    fn test_subscribe_requires_membership() {
        let mut f = setup();
        let denied = f.daemon.handle_request(Request::Subscribe {
            user: "mallory".to_string(),
            board_id: f.board_id.clone(),
        });
        assert!(matches!(denied, Response::Forbidden { .. }));

        let allowed = f.daemon.handle_request(Request::Subscribe {
            user: "vic".to_string(),
            board_id: f.board_id.clone(),
        });
        assert!(matches!(allowed, Response::Subscribed { .. }));
    }

    #[test]
    fn test_viewer_cannot_repair() {
        let mut f = setup();
        let response = f.daemon.handle_request(Request::RepairColumn {
            user: "vic".to_string(),
            column_id: f.todo.clone(),
        });
        assert!(matches!(response, Response::Forbidden { .. }));
    }

    #[test]
    fn test_repair_publishes_to_board() {
        let mut f = setup();
        create_task(&mut f, "bob", "First");
        create_task(&mut f, "bob", "Second");

        let db = rusqlite::Connection::open(f._temp_dir.path().join(KANBAN_DIR).join(crate::storage::DB_FILE)).unwrap();
        db.execute("UPDATE tasks SET position = position + 5", []).unwrap();
        drop(db);

        let mut rx = f.daemon.hub().subscribe(&f.board_id);
        let response = f.daemon.handle_request(Request::RepairColumn {
            user: "bob".to_string(),
            column_id: f.todo.clone(),
        });
        assert!(matches!(response, Response::Repaired { rewritten: 2, .. }));

        match rx.try_recv().unwrap() {
            BoardEvent::ColumnRepair { column_id, rewritten, user } => {
                assert_eq!(column_id, f.todo);
                assert_eq!(rewritten, 2);
                assert_eq!(user.id, "bob");
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Already dense: nothing rewritten, nothing published
        let response = f.daemon.handle_request(Request::RepairColumn {
            user: "bob".to_string(),
            column_id: f.todo.clone(),
        });
        assert!(matches!(response, Response::Repaired { rewritten: 0, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ping_and_shutdown() {
        let mut f = setup();
        assert!(matches!(f.daemon.handle_request(Request::Ping), Response::Pong));
        assert!(matches!(f.daemon.handle_request(Request::Shutdown), Response::Ok));
        assert!(f.daemon.shutdown_handle().load(Ordering::Relaxed));
    }
}
