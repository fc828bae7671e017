use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A callable capability exposed by a connected tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema describing the capability's input.
    pub input_schema: Value,
}

/// A named set of capabilities bound to one live server connection.
///
/// Plugins are offered per user to a [`crate::store::PluginHost`], which
/// must not attach two plugins with the same name.
#[derive(Debug, Clone)]
pub struct ToolPlugin {
    pub name: String,
    pub capabilities: Vec<Capability>,
}

impl ToolPlugin {
    pub fn new(name: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }

    /// Plugin with no discovered capabilities, used when capability listing
    /// fails on an otherwise healthy connection.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
