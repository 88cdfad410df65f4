//! Shared test helpers for tessera-core integration tests.
//!
//! [`FakeApp`] is an in-memory application with named text fields that
//! implements [`AutomationDriver`] directly. [`serve_fake_app`] puts the same
//! fake behind a TCP listener speaking the agent protocol, so the full
//! `AgentDriver -> protocol -> TCP` path can be exercised without a
//! simulator.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tessera_core::driver::{AutomationDriver, DriverError};
use tessera_core::element::UIElement;
use tessera_core::project::{ProjectDescriptor, ProjectStore, Target, TargetKind};
use tessera_core::protocol::{decode_request, encode_response, read_frame_length, Request, Response};

// ---------------------------------------------------------------------------
// FakeApp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeField {
    pub value: String,
    pub hittable: bool,
    pub enabled: bool,
    /// Number of lookups that miss before the field shows up.
    pub hidden_for: usize,
}

impl Default for FakeField {
    fn default() -> Self {
        Self {
            value: String::new(),
            hittable: true,
            enabled: true,
            hidden_for: 0,
        }
    }
}

#[derive(Debug, Default)]
struct AppState {
    fields: BTreeMap<String, FakeField>,
    focused: Option<String>,
    target: Option<String>,
    calls: Vec<String>,
}

/// In-memory application with text fields addressed by identifier.
///
/// Tapping a hittable, enabled field focuses it; typing appends to the
/// focused field.
#[derive(Debug, Default)]
pub struct FakeApp {
    state: Mutex<AppState>,
}

impl FakeApp {
    pub fn with_fields(ids: &[&str]) -> Self {
        let app = Self::default();
        {
            let mut state = app.state.lock().unwrap();
            for id in ids {
                state.fields.insert(id.to_string(), FakeField::default());
            }
        }
        app
    }

    /// Replaces (or adds) a field.
    pub fn set_field(&self, id: &str, field: FakeField) {
        self.state.lock().unwrap().fields.insert(id.to_string(), field);
    }

    pub fn value(&self, id: &str) -> Option<String> {
        self.state.lock().unwrap().fields.get(id).map(|f| f.value.clone())
    }

    /// Every driver call, in order, formatted as `name(arg)`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn target(&self) -> Option<String> {
        self.state.lock().unwrap().target.clone()
    }

    fn element(id: &str, field: &FakeField) -> UIElement {
        UIElement {
            identifier: Some(id.to_string()),
            value: Some(field.value.clone()),
            element_type: Some("TextField".to_string()),
            hittable: Some(field.hittable),
            enabled: Some(field.enabled),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AutomationDriver for FakeApp {
    async fn connect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn tap_element(&self, identifier: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("tap({identifier})"));
        let usable = match state.fields.get(identifier) {
            Some(f) => f.hittable && f.enabled,
            None => return Err(DriverError::CommandFailed(format!("no element '{identifier}'"))),
        };
        if !usable {
            return Err(DriverError::CommandFailed(format!("'{identifier}' is not hittable")));
        }
        state.focused = Some(identifier.to_string());
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("type({text})"));
        let focused = state
            .focused
            .clone()
            .ok_or_else(|| DriverError::CommandFailed("no focused element".to_string()))?;
        if let Some(field) = state.fields.get_mut(&focused) {
            field.value.push_str(text);
        }
        Ok(())
    }

    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        let state = self.state.lock().unwrap();
        let children = state
            .fields
            .iter()
            .filter(|(_, f)| f.hidden_for == 0)
            .map(|(id, f)| Self::element(id, f))
            .collect();
        Ok(vec![UIElement {
            element_type: Some("Application".to_string()),
            children,
            ..Default::default()
        }])
    }

    async fn get_element_value(&self, identifier: &str) -> Result<Option<String>, DriverError> {
        Ok(self.value(identifier))
    }

    async fn find_element_with_type(
        &self,
        identifier: &str,
        element_type: Option<&str>,
    ) -> Result<Option<UIElement>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("find({identifier})"));
        if element_type.map_or(false, |t| t != "TextField") {
            return Ok(None);
        }
        match state.fields.get_mut(identifier) {
            Some(field) if field.hidden_for > 0 => {
                field.hidden_for -= 1;
                Ok(None)
            }
            Some(field) => Ok(Some(Self::element(identifier, field))),
            None => Ok(None),
        }
    }

    async fn set_target(&self, bundle_id: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_target({bundle_id})"));
        state.target = Some(bundle_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock TCP agent backed by a FakeApp
// ---------------------------------------------------------------------------

async fn dispatch(app: &FakeApp, request: Request) -> Response {
    let result = match request {
        Request::Heartbeat => Ok(Response::Ok),
        Request::TapElement { selector } => app.tap_element(&selector).await.map(|_| Response::Ok),
        Request::TypeText { text } => app.type_text(&text).await.map(|_| Response::Ok),
        Request::SetTarget { bundle_id } => app.set_target(&bundle_id).await.map(|_| Response::Ok),
        Request::GetValue { selector, .. } => app
            .get_element_value(&selector)
            .await
            .map(|value| Response::Value { value }),
        Request::DumpTree => app.dump_tree().await.map(|tree| Response::Tree {
            json: serde_json::to_string(&tree[0]).unwrap(),
        }),
        Request::FindElement { selector, element_type } => app
            .find_element_with_type(&selector, element_type.as_deref())
            .await
            .map(|found| Response::Element {
                json: serde_json::to_string(&found).unwrap(),
            }),
    };
    result.unwrap_or_else(|e| Response::Error { message: e.to_string() })
}

/// Serves `app` over the agent protocol on a local port.
///
/// Accepts one connection and answers requests until the client hangs up.
pub async fn serve_fake_app(app: Arc<FakeApp>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        loop {
            let mut header = [0u8; 4];
            if stream.read_exact(&mut header).await.is_err() {
                return;
            }
            let mut payload = vec![0u8; read_frame_length(&header) as usize];
            if stream.read_exact(&mut payload).await.is_err() {
                return;
            }
            let response = match decode_request(&payload) {
                Ok(request) => dispatch(&app, request).await,
                Err(e) => Response::Error { message: e.to_string() },
            };
            if stream.write_all(&encode_response(&response)).await.is_err() {
                return;
            }
        }
    });

    addr
}

/// Accepts one connection, answers the heartbeat, then closes it.
pub async fn agent_that_hangs_up() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await.unwrap();
        let mut payload = vec![0u8; read_frame_length(&header) as usize];
        stream.read_exact(&mut payload).await.unwrap();
        stream.write_all(&encode_response(&Response::Ok)).await.unwrap();
    });

    addr
}

// ---------------------------------------------------------------------------
// Project fixtures
// ---------------------------------------------------------------------------

/// A fresh `Example` project with a single application target.
pub fn example_project() -> ProjectDescriptor {
    let mut project = ProjectDescriptor::new("Example");
    project.targets.push(Target::new("Example", TargetKind::Application));
    project
}

/// Writes `project` under a new temporary root, in a bundle named after it.
pub fn project_on_disk(project: &ProjectDescriptor) -> (tempfile::TempDir, ProjectStore) {
    project_in_bundle(&project.name, project)
}

/// Writes `project` into `<bundle>.xcodeproj`, rendering every shared scheme.
pub fn project_in_bundle(bundle: &str, project: &ProjectDescriptor) -> (tempfile::TempDir, ProjectStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(dir.path());
    let schemes: Vec<&str> = project.schemes.iter().map(|s| s.name.as_str()).collect();
    store.persist(bundle, project, &schemes).unwrap();
    (dir, store)
}
