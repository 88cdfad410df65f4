//! UI element types reported by the accessibility hierarchy.
//!
//! These types are shared by every automation backend and by the exerciser,
//! and do not depend on any particular transport.

use serde::{Deserialize, Serialize};

/// A UI element from the accessibility hierarchy.
///
/// Elements form a tree via the `children` field. Field names on the wire
/// follow the agent's `AX*` attribute naming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// The accessibility identifier for this element (AXUniqueId).
    #[serde(rename = "AXUniqueId", default)]
    pub identifier: Option<String>,

    /// The accessibility label (AXLabel), typically the user-visible text.
    #[serde(rename = "AXLabel", default)]
    pub label: Option<String>,

    /// The current value of the element (AXValue), e.g. text field contents.
    #[serde(rename = "AXValue", default)]
    pub value: Option<String>,

    /// The type of UI element (e.g. "Button", "TextField", "View").
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,

    /// The element's frame in screen coordinates.
    #[serde(default)]
    pub frame: Option<ElementFrame>,

    /// Child elements nested within this element.
    #[serde(default)]
    pub children: Vec<UIElement>,

    /// The accessibility role of this element.
    #[serde(default)]
    pub role: Option<String>,

    /// Whether the element can currently receive touches.
    ///
    /// `None` when the backend does not report hit-testability.
    #[serde(default)]
    pub hittable: Option<bool>,

    /// Whether the element is enabled for interaction.
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl UIElement {
    /// Returns true unless the backend reported the element as not hittable
    /// or disabled.
    pub fn is_interactable(&self) -> bool {
        self.hittable != Some(false) && self.enabled != Some(false)
    }
}

/// The frame (position and dimensions) of a UI element, in screen points
/// with the origin at the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}
