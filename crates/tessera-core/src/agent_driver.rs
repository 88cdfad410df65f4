//! [`AutomationDriver`] implementation backed by the accessibility agent.
//!
//! [`AgentDriver`] translates trait calls into [`Request`]s and sends them
//! through an [`AgentClient`]. The agent runs inside the simulator and is
//! reached over TCP on localhost.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::agent_client::{AgentClient, AgentClientError};
use crate::driver::{AutomationDriver, DriverError};
use crate::element::UIElement;
use crate::protocol::{Request, Response};

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Maps transport failures to [`DriverError`], keeping agent errors as command failures.
fn map_client_error(err: AgentClientError) -> DriverError {
    match err {
        AgentClientError::NotConnected => DriverError::NotConnected,
        AgentClientError::ConnectionFailed(msg) => DriverError::ConnectionLost(msg),
        AgentClientError::Io(e) => DriverError::Io(e),
        AgentClientError::Protocol(e) => DriverError::CommandFailed(e.to_string()),
        AgentClientError::AgentError(msg) => DriverError::CommandFailed(msg),
        AgentClientError::Timeout => DriverError::Timeout,
    }
}

fn expect_ok(response: Response) -> Result<(), DriverError> {
    match response {
        Response::Ok => Ok(()),
        other => Err(DriverError::CommandFailed(format!("unexpected response: {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// AgentDriver
// ---------------------------------------------------------------------------

/// An [`AutomationDriver`] talking to the agent over TCP.
///
/// The client sits behind a [`tokio::sync::Mutex`] so `&self` trait methods
/// can send requests; requests are strictly one at a time.
pub struct AgentDriver {
    host: String,
    port: u16,
    client: Mutex<Option<AgentClient>>,
}

impl AgentDriver {
    /// Creates a driver for `host:port`. No connection is made until
    /// [`connect`](AutomationDriver::connect).
    pub fn direct(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client: Mutex::new(None),
        }
    }

    /// Wraps an already-connected client, e.g. one built over an in-memory
    /// stream.
    pub fn from_client(client: AgentClient) -> Self {
        Self {
            host: String::new(),
            port: 0,
            client: Mutex::new(Some(client)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn create_client(&self) -> Result<AgentClient, DriverError> {
        let addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                DriverError::ConnectionLost(format!("cannot resolve {}:{}", self.host, self.port))
            })?;

        let mut client = AgentClient::new(addr);
        client.connect().await.map_err(map_client_error)?;
        client.heartbeat().await.map_err(map_client_error)?;
        Ok(client)
    }

    async fn send(&self, request: &Request) -> Result<Response, DriverError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(DriverError::NotConnected)?;
        let result = client.send(request).await.map_err(map_client_error);
        if !client.is_connected() {
            guard.take();
        }
        result
    }
}

// ---------------------------------------------------------------------------
// AutomationDriver implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl AutomationDriver for AgentDriver {
    #[instrument(skip(self), fields(host = %self.host, port = self.port), level = "debug")]
    async fn connect(&mut self) -> Result<(), DriverError> {
        let client = self.create_client().await?;
        *self.client.lock().await = Some(client);
        debug!("agent connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|guard| guard.as_ref().map_or(false, |c| c.is_connected()))
            // A held lock means a request is in flight on a live client.
            .unwrap_or(true)
    }

    #[instrument(skip(self), level = "debug")]
    async fn tap_element(&self, identifier: &str) -> Result<(), DriverError> {
        let response = self
            .send(&Request::TapElement { selector: identifier.to_string() })
            .await?;
        expect_ok(response)
    }

    #[instrument(skip(self), level = "debug")]
    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        let response = self.send(&Request::TypeText { text: text.to_string() }).await?;
        expect_ok(response)
    }

    #[instrument(skip(self), level = "debug")]
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        match self.send(&Request::DumpTree).await? {
            Response::Tree { json } => {
                let root: UIElement =
                    serde_json::from_str(&json).map_err(|e| DriverError::JsonParse(e.to_string()))?;
                Ok(vec![root])
            }
            other => Err(DriverError::CommandFailed(format!("unexpected response: {other:?}"))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_element_value(&self, identifier: &str) -> Result<Option<String>, DriverError> {
        let response = self
            .send(&Request::GetValue {
                selector: identifier.to_string(),
                element_type: None,
            })
            .await?;
        match response {
            Response::Value { value } => Ok(value),
            other => Err(DriverError::CommandFailed(format!("unexpected response: {other:?}"))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_element_with_type(
        &self,
        identifier: &str,
        element_type: Option<&str>,
    ) -> Result<Option<UIElement>, DriverError> {
        let response = self
            .send(&Request::FindElement {
                selector: identifier.to_string(),
                element_type: element_type.map(str::to_string),
            })
            .await?;
        match response {
            Response::Element { json } => {
                serde_json::from_str(&json).map_err(|e| DriverError::JsonParse(e.to_string()))
            }
            other => Err(DriverError::CommandFailed(format!("unexpected response: {other:?}"))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_target(&self, bundle_id: &str) -> Result<(), DriverError> {
        let response = self
            .send(&Request::SetTarget { bundle_id: bundle_id.to_string() })
            .await?;
        expect_ok(response)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
