use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::Result;

/// One command of the handshake sent to every newly attached backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreludeCommand {
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn empty_params() -> Value {
    json!({})
}

impl PreludeCommand {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

pub fn default_prelude() -> Vec<PreludeCommand> {
    vec![
        PreludeCommand::new("Runtime.enable", json!({})),
        PreludeCommand::new("Debugger.enable", json!({})),
    ]
}

/// Reads a JSON array of `{ "method", "params" }` objects.
pub async fn load_prelude(path: &Path) -> Result<Vec<PreludeCommand>> {
    let contents = tokio::fs::read(path).await?;
    let commands = serde_json::from_slice(&contents)?;
    Ok(commands)
}
