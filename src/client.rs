//! Client for connecting to the board daemon.

use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::events::BoardEvent;
use crate::protocol::{Request, Response};
use crate::store::MoveOutcome;
use crate::types::{Board, Column, Member, Priority, Project, Role, Task};
use eyre::{Context, Result, bail, eyre};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for communicating with the board daemon on behalf of one user.
pub struct Client {
    root: PathBuf,
    user: String,
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, user: &str, auto_start: bool) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(_) if auto_start => {
                if !is_daemon_running(root) {
                    start_daemon(root).context("Failed to auto-start daemon")?;

                    // Wait for daemon to be ready
                    let mut attempts = 0;
                    loop {
                        if attempts > 20 {
                            bail!("Daemon failed to start in time");
                        }
                        std::thread::sleep(Duration::from_millis(50));
                        if let Ok(stream) = UnixStream::connect(&socket_path) {
                            break stream;
                        }
                        attempts += 1;
                    }
                } else {
                    UnixStream::connect(&socket_path).context("Failed to connect to daemon")?
                }
            }
            Err(e) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        let writer = stream.try_clone().context("Failed to clone socket")?;

        Ok(Self {
            root: root.to_path_buf(),
            user: user.to_string(),
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The user this client acts as.
    pub fn user(&self) -> &str {
        &self.user
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        let request_json = serde_json::to_string(request)?;
        writeln!(self.writer, "{}", request_json)?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Response> {
        let mut response_line = String::new();
        let read = self.reader.read_line(&mut response_line)?;
        if read == 0 {
            bail!("Daemon closed the connection");
        }
        let response: Response = serde_json::from_str(&response_line)?;
        Ok(response)
    }

    /// Send a request and receive a response.
    fn request(&mut self, request: Request) -> Result<Response> {
        self.send(&request)?;
        self.read_response()
    }

    /// Create a project owned by this user.
    pub fn create_project(&mut self, name: &str, description: Option<&str>) -> Result<Project> {
        let response = self.request(Request::CreateProject {
            user: self.user.clone(),
            name: name.to_string(),
            description: description.map(String::from),
        })?;

        match response {
            Response::Project { project } => Ok(project),
            other => Err(failure(other)),
        }
    }

    /// Add a member to a project.
    pub fn add_member(&mut self, project_id: &str, member: &str, role: Role) -> Result<Member> {
        let response = self.request(Request::AddMember {
            user: self.user.clone(),
            project_id: project_id.to_string(),
            member: member.to_string(),
            role,
        })?;

        match response {
            Response::Member { member } => Ok(member),
            other => Err(failure(other)),
        }
    }

    pub fn create_board(&mut self, project_id: &str, name: &str) -> Result<Board> {
        let response = self.request(Request::CreateBoard {
            user: self.user.clone(),
            project_id: project_id.to_string(),
            name: name.to_string(),
        })?;

        match response {
            Response::Board { board } => Ok(board),
            other => Err(failure(other)),
        }
    }

    pub fn create_column(&mut self, board_id: &str, name: &str, wip_limit: Option<u32>) -> Result<Column> {
        let response = self.request(Request::CreateColumn {
            user: self.user.clone(),
            board_id: board_id.to_string(),
            name: name.to_string(),
            wip_limit,
        })?;

        match response {
            Response::Column { column } => Ok(column),
            other => Err(failure(other)),
        }
    }

    /// Create a task at the end of a column.
    pub fn create_task(
        &mut self,
        column_id: &str,
        title: &str,
        description: Option<&str>,
        priority: Priority,
    ) -> Result<Task> {
        let response = self.request(Request::CreateTask {
            user: self.user.clone(),
            column_id: column_id.to_string(),
            title: title.to_string(),
            description: description.map(String::from),
            priority,
        })?;

        match response {
            Response::Task { task } => Ok(task),
            other => Err(failure(other)),
        }
    }

    /// Move a task to a position in a column.
    pub fn move_task(&mut self, task_id: &str, column_id: &str, order: i64) -> Result<MoveOutcome> {
        let response = self.request(Request::MoveTask {
            user: self.user.clone(),
            task_id: task_id.to_string(),
            column_id: column_id.to_string(),
            order,
        })?;

        match response {
            Response::Moved { outcome } => Ok(outcome),
            other => Err(failure(other)),
        }
    }

    pub fn delete_task(&mut self, task_id: &str) -> Result<()> {
        let response = self.request(Request::DeleteTask {
            user: self.user.clone(),
            task_id: task_id.to_string(),
        })?;

        match response {
            Response::Ok => Ok(()),
            other => Err(failure(other)),
        }
    }

    /// Get a task by ID.
    pub fn get_task(&mut self, id: &str) -> Result<Option<Task>> {
        let response = self.request(Request::GetTask {
            user: self.user.clone(),
            id: id.to_string(),
        })?;

        match response {
            Response::Task { task } => Ok(Some(task)),
            Response::NotFound { .. } => Ok(None),
            other => Err(failure(other)),
        }
    }

    /// List a column's tasks in order.
    pub fn list_column(&mut self, column_id: &str) -> Result<Vec<Task>> {
        let response = self.request(Request::ListColumn {
            user: self.user.clone(),
            column_id: column_id.to_string(),
        })?;

        match response {
            Response::Tasks { tasks } => Ok(tasks),
            other => Err(failure(other)),
        }
    }

    /// Rewrite a column's orders to be dense; returns how many changed.
    pub fn repair_column(&mut self, column_id: &str) -> Result<usize> {
        let response = self.request(Request::RepairColumn {
            user: self.user.clone(),
            column_id: column_id.to_string(),
        })?;

        match response {
            Response::Repaired { rewritten, .. } => Ok(rewritten),
            other => Err(failure(other)),
        }
    }

    /// Subscribe to a board and hand each event to `on_event` until it
    /// returns false or the daemon goes away.
    pub fn watch(mut self, board_id: &str, mut on_event: impl FnMut(BoardEvent) -> bool) -> Result<()> {
        let response = self.request(Request::Subscribe {
            user: self.user.clone(),
            board_id: board_id.to_string(),
        })?;

        match response {
            Response::Subscribed { .. } => {}
            other => return Err(failure(other)),
        }

        self.reader
            .get_ref()
            .set_read_timeout(None)
            .context("Failed to clear read timeout")?;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            match serde_json::from_str::<Response>(&line)? {
                Response::Event { event } => {
                    if !on_event(event) {
                        return Ok(());
                    }
                }
                other => log::warn!("Ignoring unexpected message on subscription: {:?}", other),
            }
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.request(Request::Shutdown)? {
            Response::Ok => Ok(()),
            other => Err(failure(other)),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.request(Request::Ping)? {
            Response::Pong => Ok(()),
            other => Err(failure(other)),
        }
    }
}

/// Turn a non-success response into an error.
fn failure(response: Response) -> eyre::Report {
    match response {
        Response::NotFound { id } => eyre!("Not found: {}", id),
        Response::Forbidden { message } => eyre!("Forbidden: {}", message),
        Response::Invalid { message } => eyre!("Invalid request: {}", message),
        Response::Conflict { message } => eyre!("Conflict: {}", message),
        Response::Error { message } => eyre!("{}", message),
        _ => eyre!("Unexpected response"),
    }
}
