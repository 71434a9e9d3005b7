//! Procedure schema.
//!
//! Describes every registered procedure (id, parameters, result) so a peer
//! can discover what a registry serves. Rendered as JSON:
//!
//! ```json
//! {
//!   "procedures": [
//!     {
//!       "name": "add",
//!       "id": 1,
//!       "params": [
//!         { "index": 0, "type": "i64", "strategy": { "scalar": "i64" } },
//!         { "index": 1, "type": "i64", "strategy": { "scalar": "i64" } }
//!       ],
//!       "result": { "type": "i64", "void": false }
//!     }
//!   ]
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use packwire::rpc::ProcedureRegistry;
//!
//! let mut registry = ProcedureRegistry::new();
//! registry.register("add", |a: i64, b: i64| a + b);
//!
//! let json = registry.build_schema().to_json();
//! assert!(json.contains("\"add\""));
//! ```

use serde::Serialize;
use serde_json::json;

use super::method::{PackedMethod, ParamSlot, ResultSlot};

/// Description of one procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureInfo {
    /// Registered name.
    pub name: String,
    /// Assigned id (1-based).
    pub id: u32,
    /// Parameters in argument order.
    pub params: Vec<ParamSlot>,
    /// Result description.
    pub result: ResultSlot,
}

/// Schema describing available procedures, ordered by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcedureSchema {
    /// Procedure descriptions.
    pub procedures: Vec<ProcedureInfo>,
}

impl ProcedureSchema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a procedure, keeping the list ordered by id.
    pub fn add_procedure(&mut self, name: &str, id: u32, method: &PackedMethod) {
        let info = ProcedureInfo {
            name: name.to_string(),
            id,
            params: method.params().to_vec(),
            result: method.result().clone(),
        };
        let at = self.procedures.partition_point(|p| p.id < id);
        self.procedures.insert(at, info);
    }

    /// Get a procedure by name.
    pub fn get(&self, name: &str) -> Option<&ProcedureInfo> {
        self.procedures.iter().find(|p| p.name == name)
    }

    /// Number of procedures.
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Check if schema is empty.
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Render the schema as a JSON string.
    pub fn to_json(&self) -> String {
        json!({ "procedures": self.procedures }).to_string()
    }
}
