//! Embedded server lifecycle and management sessions.
//!
//! The orchestrator only sees the [`ServerLauncher`], [`EmbeddedServer`]
//! and [`AdminSession`] traits. [`StdioServerLauncher`] is the concrete
//! adapter: it runs a host process that boots the server in admin-only
//! mode and speaks line-delimited JSON on stdin/stdout.

use super::protocol::{Operation, Response};
use crate::error::{InstallError, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use xp_config::ServerSettings;

/// Where the server should run from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub home: PathBuf,
    pub module_path: PathBuf,
}

/// Starts embedded servers.
pub trait ServerLauncher {
    fn start(&self, spec: &ServerSpec) -> Result<Box<dyn EmbeddedServer>>;
}

/// A running embedded server.
pub trait EmbeddedServer {
    /// Open a management session. The session borrows the server, so it
    /// always ends before the server can be stopped.
    fn open_session(&mut self) -> Result<Box<dyn AdminSession + '_>>;

    /// Stop the server. Stopping twice is a no-op.
    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// A management session against a running server.
pub trait AdminSession {
    fn execute(&mut self, operation: &Operation) -> Result<Response>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Owns a started server and stops it when dropped.
pub struct ServerGuard {
    server: Box<dyn EmbeddedServer>,
}

impl ServerGuard {
    pub fn new(server: Box<dyn EmbeddedServer>) -> Self {
        Self { server }
    }

    pub fn open_session(&mut self) -> Result<Box<dyn AdminSession + '_>> {
        self.server.open_session()
    }

    /// Stop explicitly, reporting the error.
    pub fn stop(mut self) -> Result<()> {
        self.server.stop()
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        if self.server.is_running() {
            warn!(target: "install.server", "Server still running at drop; stopping it");
            if let Err(e) = self.server.stop() {
                warn!(target: "install.server", error = %e, "Failed to stop server");
            }
        }
    }
}

// ============================================================================
// Stdio host transport
// ============================================================================

/// Launches the configured host command.
#[derive(Debug, Clone)]
pub struct StdioServerLauncher {
    settings: ServerSettings,
}

impl StdioServerLauncher {
    pub fn new(settings: ServerSettings) -> Self {
        Self { settings }
    }

    /// Full argument list passed to the host command.
    pub fn host_args(&self, spec: &ServerSpec) -> Vec<String> {
        let mut args = vec![
            format!("--jboss-home={}", spec.home.display()),
            format!("--module-path={}", spec.module_path.display()),
            "--admin-only".to_string(),
        ];
        args.extend(self.settings.host_args.iter().cloned());
        args
    }
}

#[derive(Debug, Deserialize)]
struct ReadyLine {
    ready: bool,
    #[serde(default)]
    error: Option<String>,
}

impl ServerLauncher for StdioServerLauncher {
    fn start(&self, spec: &ServerSpec) -> Result<Box<dyn EmbeddedServer>> {
        let args = self.host_args(spec);
        info!(
            target: "install.server_start",
            command = %self.settings.host_command,
            home = %spec.home.display(),
            "Starting embedded server"
        );

        let mut child = Command::new(&self.settings.host_command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                InstallError::Server(format!(
                    "failed to run {}: {}",
                    self.settings.host_command, e
                ))
            })?;

        let stdin = child.stdin.take();
        let lines = match child.stdout.take() {
            Some(stdout) => spawn_line_reader(stdout),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(InstallError::Server("host stdout unavailable".to_string()));
            }
        };

        let mut server = StdioServer {
            child,
            stdin,
            lines,
            operation_timeout: self.settings.operation_timeout(),
            shutdown_timeout: self.settings.shutdown_timeout(),
            running: true,
        };
        server.await_ready(self.settings.startup_timeout())?;
        info!(target: "install.server_ready", pid = server.child.id(), "Embedded server ready");
        Ok(Box::new(server))
    }
}

fn spawn_line_reader(stdout: impl std::io::Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// A server host process.
pub struct StdioServer {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    operation_timeout: Option<Duration>,
    shutdown_timeout: Duration,
    running: bool,
}

impl StdioServer {
    fn await_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = deadline_after(timeout);
        loop {
            let line = match self.next_line(deadline) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    self.kill();
                    return Err(InstallError::Server(format!(
                        "server did not report ready within {}s",
                        timeout.as_secs()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let status = self.reap();
                    return Err(InstallError::Server(format!(
                        "server host exited before becoming ready ({})",
                        status
                    )));
                }
            };

            match serde_json::from_str::<ReadyLine>(&line) {
                Ok(ReadyLine { ready: true, .. }) => return Ok(()),
                Ok(ReadyLine { ready: false, error }) => {
                    self.kill();
                    return Err(InstallError::Server(
                        error.unwrap_or_else(|| "server failed to start".to_string()),
                    ));
                }
                Err(_) => debug!(line = %line, "Ignoring host output before ready"),
            }
        }
    }

    fn request(&mut self, operation: &Operation) -> Result<Response> {
        if !self.running {
            return Err(InstallError::Session("server is not running".to_string()));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| InstallError::Session("session input closed".to_string()))?;

        let payload = operation.to_json().to_string();
        writeln!(stdin, "{}", payload)
            .and_then(|_| stdin.flush())
            .map_err(|e| InstallError::Session(format!("failed to send {}: {}", operation, e)))?;
        debug!(target: "install.admin_request", operation = %operation, "Sent operation");

        let deadline = self.operation_timeout.and_then(deadline_after);
        loop {
            let line = self.next_line(deadline).map_err(|e| match e {
                RecvTimeoutError::Timeout => InstallError::Session(format!(
                    "{} timed out after {}s",
                    operation,
                    self.operation_timeout.map_or(0, |t| t.as_secs())
                )),
                RecvTimeoutError::Disconnected => closed_session(operation),
            })?;

            // Responses are single JSON objects; anything else is host logging.
            if !line.trim_start().starts_with('{') {
                debug!(line = %line, "Ignoring host output that is not a response");
                continue;
            }
            return serde_json::from_str(&line).map_err(|e| {
                InstallError::Session(format!("unreadable response to {}: {}", operation, e))
            });
        }
    }

    /// Next stdout line, waiting until `deadline` or forever when there is none.
    fn next_line(&self, deadline: Option<Instant>) -> std::result::Result<String, RecvTimeoutError> {
        match deadline {
            Some(deadline) => self
                .lines
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self.lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        }
    }

    fn kill(&mut self) {
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.running = false;
    }

    fn reap(&mut self) -> String {
        self.stdin.take();
        self.running = false;
        match self.child.wait() {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

/// `None` when the timeout is too large to represent; callers then wait without a deadline.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn closed_session(operation: &Operation) -> InstallError {
    InstallError::Session(format!("server host closed the session during {}", operation))
}

impl EmbeddedServer for StdioServer {
    fn open_session(&mut self) -> Result<Box<dyn AdminSession + '_>> {
        if !self.running {
            return Err(InstallError::Session("server is not running".to_string()));
        }
        debug!(target: "install.session", "Management session opened");
        Ok(Box::new(StdioSession { server: self }))
    }

    fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        // EOF on stdin asks the host to shut down.
        self.stdin.take();
        let deadline = deadline_after(self.shutdown_timeout);
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.running = false;
                    if !status.success() {
                        warn!(target: "install.server_stop", status = %status, "Server host exited uncleanly");
                    }
                    info!(target: "install.server_stop", "Embedded server stopped");
                    return Ok(());
                }
                Ok(None) if deadline.map_or(true, |d| Instant::now() < d) => {
                    thread::sleep(Duration::from_millis(50))
                }
                Ok(None) => {
                    warn!(
                        target: "install.server_stop",
                        timeout_secs = self.shutdown_timeout.as_secs(),
                        "Server host did not exit in time; killing it"
                    );
                    self.kill();
                    return Ok(());
                }
                Err(e) => {
                    self.kill();
                    return Err(InstallError::Server(format!("failed to stop server: {}", e)));
                }
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for StdioServer {
    fn drop(&mut self) {
        if self.running {
            self.kill();
        }
    }
}

struct StdioSession<'a> {
    server: &'a mut StdioServer,
}

impl AdminSession for StdioSession<'_> {
    fn execute(&mut self, operation: &Operation) -> Result<Response> {
        self.server.request(operation)
    }

    fn close(self: Box<Self>) -> Result<()> {
        debug!(target: "install.session", "Management session closed");
        Ok(())
    }
}
