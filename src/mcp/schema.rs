//! MCP schema types.

use serde::{Deserialize, Serialize};

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
    /// Declared result schema, for servers that advertise one.
    pub output_schema: Option<serde_json::Value>,
}

impl MCPToolSchema {
    /// Input schema with an object `type` guaranteed, so argument validation
    /// applies the same rules as for local tools.
    pub fn normalized_input_schema(&self) -> serde_json::Value {
        match &self.input_schema {
            serde_json::Value::Object(map) if map.contains_key("type") => self.input_schema.clone(),
            serde_json::Value::Object(map) => {
                let mut map = map.clone();
                map.insert("type".into(), serde_json::Value::String("object".into()));
                serde_json::Value::Object(map)
            }
            _ => serde_json::json!({ "type": "object", "properties": {} }),
        }
    }
}
