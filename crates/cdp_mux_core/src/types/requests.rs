use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::methods;

pub type RequestId = u64;

fn empty_params() -> Value {
    Value::Object(Map::new())
}

/// A protocol message as it arrives on the wire, before routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl RawMessage {
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn event(method: impl Into<String>, params: Value) -> Self {
        Self::new(None, method, params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Runtime,
    Debugger,
    Console,
    Log,
    Profiler,
    HeapProfiler,
}

impl Domain {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Runtime" => Some(Self::Runtime),
            "Debugger" => Some(Self::Debugger),
            "Console" => Some(Self::Console),
            "Log" => Some(Self::Log),
            "Profiler" => Some(Self::Profiler),
            "HeapProfiler" => Some(Self::HeapProfiler),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runtime => "Runtime",
            Self::Debugger => "Debugger",
            Self::Console => "Console",
            Self::Log => "Log",
            Self::Profiler => "Profiler",
            Self::HeapProfiler => "HeapProfiler",
        }
    }
}

/// Parameters of `Debugger.setBreakpointByUrl`. `url` is a client-local path until the
/// router rewrites it for a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointParams {
    pub line_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBreakpointParams {
    pub breakpoint_id: String,
}

/// The subset of the protocol the router interprets. Anything else stays raw.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Enable {
        id: Option<RequestId>,
        domain: Domain,
    },
    SetBreakpointByUrl {
        id: Option<RequestId>,
        params: SetBreakpointParams,
    },
    RemoveBreakpoint {
        id: Option<RequestId>,
        params: RemoveBreakpointParams,
    },
    ScriptParsed {
        params: Value,
    },
    Paused {
        params: Value,
    },
    Resumed {
        params: Value,
    },
    /// A recognized method whose params did not decode.
    Invalid {
        id: Option<RequestId>,
        method: String,
        reason: String,
    },
    Unrecognized(RawMessage),
}

impl From<RawMessage> for Inbound {
    fn from(raw: RawMessage) -> Self {
        let Some((domain_name, method)) = raw.method.split_once('.') else {
            return Self::Unrecognized(raw);
        };
        let Some(domain) = Domain::parse(domain_name) else {
            return Self::Unrecognized(raw);
        };

        match (domain, method) {
            (_, methods::ENABLE) => Self::Enable { id: raw.id, domain },
            (Domain::Debugger, "setBreakpointByUrl") => {
                match serde_json::from_value(raw.params.clone()) {
                    Ok(params) => Self::SetBreakpointByUrl { id: raw.id, params },
                    Err(e) => Self::invalid(raw, e),
                }
            }
            (Domain::Debugger, "removeBreakpoint") => {
                match serde_json::from_value(raw.params.clone()) {
                    Ok(params) => Self::RemoveBreakpoint { id: raw.id, params },
                    Err(e) => Self::invalid(raw, e),
                }
            }
            (Domain::Debugger, "scriptParsed") => Self::ScriptParsed { params: raw.params },
            (Domain::Debugger, "paused") => Self::Paused { params: raw.params },
            (Domain::Debugger, "resumed") => Self::Resumed { params: raw.params },
            _ => Self::Unrecognized(raw),
        }
    }
}

impl Inbound {
    fn invalid(raw: RawMessage, err: serde_json::Error) -> Self {
        Self::Invalid {
            id: raw.id,
            method: raw.method,
            reason: err.to_string(),
        }
    }
}
