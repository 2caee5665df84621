//! Test utilities for xp-core.
//!
//! This module provides:
//! - A scripted in-process server ([`MockLauncher`]) that records every
//!   lifecycle call and management operation
//! - Fixture builders for server installations and installer archives

use crate::error::{InstallError, Result};
use crate::installer::protocol::{Operation, Response, CUMULATIVE_PATCH_ID, PRODUCT_VERSION};
use crate::installer::server::{AdminSession, EmbeddedServer, ServerLauncher, ServerSpec};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use xp_bundle::{ArchiveWriter, Manifest, LAYERS_KEY, MANIFEST_PATH, PATCH_ENTRY};

// ============================================================================
// Scripted server
// ============================================================================

/// How the mock server behaves.
#[derive(Debug, Clone)]
pub struct MockScript {
    /// Fail `start` with this message.
    pub start_error: Option<String>,
    /// Fail `open_session` with this message.
    pub session_error: Option<String>,
    pub product_version: String,
    pub cumulative_patch_id: String,
    /// Answer the patch operation with `failed` and this description.
    pub patch_failure: Option<String>,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            start_error: None,
            session_error: None,
            product_version: "7.4.0.GA".to_string(),
            cumulative_patch_id: "base".to_string(),
            patch_failure: None,
        }
    }
}

/// Something the mock server observed.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Started(ServerSpec),
    SessionOpened,
    Executed(Operation),
    SessionClosed,
    Stopped,
}

type EventLog = Arc<Mutex<Vec<MockEvent>>>;

fn push(log: &EventLog, event: MockEvent) {
    log.lock().unwrap_or_else(|e| e.into_inner()).push(event);
}

/// Launcher for [`MockScript`]-driven servers.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    script: MockScript,
    events: EventLog,
}

impl MockLauncher {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            events: Arc::default(),
        }
    }

    /// Everything observed so far, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of executed operations, in order.
    pub fn operations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Executed(op) => Some(op.name().to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn was_started(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, MockEvent::Started(_)))
    }
}

impl ServerLauncher for MockLauncher {
    fn start(&self, spec: &ServerSpec) -> Result<Box<dyn EmbeddedServer>> {
        if let Some(message) = &self.script.start_error {
            return Err(InstallError::Server(message.clone()));
        }
        push(&self.events, MockEvent::Started(spec.clone()));
        Ok(Box::new(MockServer {
            script: self.script.clone(),
            events: Arc::clone(&self.events),
            running: true,
        }))
    }
}

struct MockServer {
    script: MockScript,
    events: EventLog,
    running: bool,
}

impl EmbeddedServer for MockServer {
    fn open_session(&mut self) -> Result<Box<dyn AdminSession + '_>> {
        if let Some(message) = &self.script.session_error {
            return Err(InstallError::Session(message.clone()));
        }
        push(&self.events, MockEvent::SessionOpened);
        Ok(Box::new(MockSession { server: self }))
    }

    fn stop(&mut self) -> Result<()> {
        if self.running {
            self.running = false;
            push(&self.events, MockEvent::Stopped);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

struct MockSession<'a> {
    server: &'a mut MockServer,
}

impl AdminSession for MockSession<'_> {
    fn execute(&mut self, operation: &Operation) -> Result<Response> {
        push(&self.server.events, MockEvent::Executed(operation.clone()));
        let script = &self.server.script;
        let attribute = operation.parameter("name").and_then(Value::as_str);

        Ok(match (operation.name(), attribute) {
            ("read-attribute", Some(PRODUCT_VERSION)) => {
                Response::success(script.product_version.as_str())
            }
            ("read-attribute", Some(CUMULATIVE_PATCH_ID)) => {
                Response::success(script.cumulative_patch_id.as_str())
            }
            ("patch", _) => match &script.patch_failure {
                Some(description) => Response::failed(description.as_str()),
                None => Response::success(Value::Null),
            },
            _ => Response::failed(format!("unsupported operation {}", operation)),
        })
    }

    fn close(self: Box<Self>) -> Result<()> {
        push(&self.server.events, MockEvent::SessionClosed);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Lay out a minimal pristine server installation under `root`.
///
/// Returns the server home.
pub fn fake_installation(root: &Path) -> PathBuf {
    let home = root.join("server");
    fs::create_dir_all(home.join("modules/system/layers/base")).expect("create modules");
    fs::create_dir_all(home.join("standalone/configuration")).expect("create configuration");
    fs::write(
        home.join("standalone/configuration/standalone.xml"),
        "<server/>",
    )
    .expect("write standalone.xml");
    home
}

/// Build an installer archive in `dir`.
///
/// `layers` of `None` writes a manifest without the layer key.
/// `added` entries are `(relative path, contents)` under `added-configs/`.
pub fn write_installer_archive(dir: &Path, layers: Option<&str>, added: &[(&str, &str)]) -> PathBuf {
    let src = dir.join("archive-src");
    fs::create_dir_all(&src).expect("create archive source");

    let mut manifest = Manifest::new();
    if let Some(layers) = layers {
        manifest.set(LAYERS_KEY, layers);
    }
    manifest
        .write_to(&src.join(MANIFEST_PATH))
        .expect("write manifest");
    fs::write(src.join(PATCH_ENTRY), b"PK-patch-payload").expect("write patch");
    for (relative, contents) in added {
        let path = src.join("added-configs").join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create added dir");
        fs::write(&path, contents).expect("write added config");
    }

    let mut writer = ArchiveWriter::new();
    writer.add_tree(&src).expect("add tree");
    let out = dir.join("xp-installer.jar");
    writer.write(&out).expect("write archive");
    out
}
