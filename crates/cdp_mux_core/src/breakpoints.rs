//! Breakpoint registry: the breakpoints the client currently believes are active, keyed by the
//! id the accepting backend assigned, holding the params exactly as the client sent them.

use indexmap::IndexMap;
use serde_json::Value;

use crate::paths::PathTranslator;
use crate::types::SetBreakpointParams;
use crate::Result;

#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    entries: IndexMap<String, SetBreakpointParams>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, breakpoint_id: impl Into<String>, params: SetBreakpointParams) {
        self.entries.insert(breakpoint_id.into(), params);
    }

    pub fn remove(&mut self, breakpoint_id: &str) -> Option<SetBreakpointParams> {
        self.entries.shift_remove(breakpoint_id)
    }

    pub fn get(&self, breakpoint_id: &str) -> Option<&SetBreakpointParams> {
        self.entries.get(breakpoint_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were accepted.
    pub fn snapshot(&self) -> Vec<(String, SetBreakpointParams)> {
        self.entries
            .iter()
            .map(|(id, params)| (id.clone(), params.clone()))
            .collect()
    }
}

/// The params a backend should receive: `url` rewritten from client path to backend URL.
pub fn to_backend_params(params: &SetBreakpointParams, translator: &dyn PathTranslator) -> Result<Value> {
    let mut rewritten = params.clone();
    if let Some(path) = &params.url {
        rewritten.url = Some(translator.path_to_backend_url(path)?);
    }
    Ok(serde_json::to_value(rewritten)?)
}

/// `result.breakpointId` of a successful `setBreakpointByUrl` reply.
pub fn breakpoint_id(result: &Value) -> Option<&str> {
    result.get("breakpointId").and_then(Value::as_str)
}
