//! Automation driver trait for backend-agnostic UI automation.
//!
//! [`AutomationDriver`] is the seam between the exerciser and whatever is
//! actually talking to the application under test. The shipped backend is
//! [`AgentDriver`](crate::agent_driver::AgentDriver), which speaks the binary
//! protocol in [`crate::protocol`] to an accessibility agent running on the
//! simulator. Tests plug in in-memory fakes.
//!
//! ```no_run
//! use tessera_core::agent_driver::AgentDriver;
//! use tessera_core::driver::AutomationDriver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut driver = AgentDriver::direct("localhost", 9800);
//! driver.connect().await?;
//! if let Some(field) = driver.find_element("t_1").await? {
//!     println!("found {:?}", field.element_type);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::element::UIElement;

/// Errors that can occur during automation driver operations.
///
/// Unifies errors from all backends so callers can handle them without
/// knowing which backend produced them.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A command reached the backend but failed there.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The backend is not connected.
    #[error("Not connected to automation backend")]
    NotConnected,

    /// The connection to the agent was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// An operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data returned by the backend.
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl DriverError {
    /// Returns true if the error means the backend itself is unreachable,
    /// as opposed to a single command being rejected.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DriverError::NotConnected
                | DriverError::ConnectionLost(_)
                | DriverError::Timeout
                | DriverError::Io(_)
        )
    }
}

/// Depth-first search for the first element whose identifier equals
/// `identifier`, optionally restricted to one element type.
pub(crate) fn search_by_identifier(
    elements: &[UIElement],
    identifier: &str,
    element_type: Option<&str>,
) -> Option<UIElement> {
    for element in elements {
        let id_matches = element.identifier.as_deref() == Some(identifier);
        let type_matches = match element_type {
            Some(typ) => element.element_type.as_deref() == Some(typ),
            None => true,
        };
        if id_matches && type_matches {
            return Some(element.clone());
        }
        if let Some(found) = search_by_identifier(&element.children, identifier, element_type) {
            return Some(found);
        }
    }
    None
}

/// Backend-agnostic UI automation against a running application.
///
/// Implementors must provide connection handling, tapping, typing, tree
/// dumping and value lookup. Element search has default implementations
/// that dump the full tree and search locally; backends with server-side
/// search should override them.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Establish connection to the automation backend.
    async fn connect(&mut self) -> Result<(), DriverError>;

    /// Check if the backend is ready to accept commands.
    fn is_connected(&self) -> bool;

    /// Tap an element by its accessibility identifier.
    async fn tap_element(&self, identifier: &str) -> Result<(), DriverError>;

    /// Type text into the currently focused element.
    async fn type_text(&self, text: &str) -> Result<(), DriverError>;

    /// Get the full UI element hierarchy of the current screen.
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError>;

    /// Get an element's value by its accessibility identifier.
    ///
    /// `Ok(None)` means the element exists but has no value.
    async fn get_element_value(&self, identifier: &str) -> Result<Option<String>, DriverError>;

    /// Find an element by its accessibility identifier.
    async fn find_element(&self, identifier: &str) -> Result<Option<UIElement>, DriverError> {
        self.find_element_with_type(identifier, None).await
    }

    /// Find an element by identifier, optionally filtered by element type
    /// (e.g. `"TextField"`).
    async fn find_element_with_type(
        &self,
        identifier: &str,
        element_type: Option<&str>,
    ) -> Result<Option<UIElement>, DriverError> {
        let tree = self.dump_tree().await?;
        Ok(search_by_identifier(&tree, identifier, element_type))
    }

    /// Set the target application for accessibility queries.
    ///
    /// Not all backends support this; the default returns an error.
    async fn set_target(&self, _bundle_id: &str) -> Result<(), DriverError> {
        Err(DriverError::CommandFailed("set_target not supported by this backend".to_string()))
    }
}
