pub mod requests;
pub mod responses;

pub use requests::{Domain, Inbound, RawMessage, RemoveBreakpointParams, RequestId, SetBreakpointParams};
pub use responses::{ClientMessage, ErrorBody};

/// Method names the router interprets. Anything else from the client is rejected.
pub mod methods {
    pub const ENABLE: &str = "enable";
    pub const SET_BREAKPOINT_BY_URL: &str = "Debugger.setBreakpointByUrl";
    pub const REMOVE_BREAKPOINT: &str = "Debugger.removeBreakpoint";
    pub const SCRIPT_PARSED: &str = "Debugger.scriptParsed";
    pub const PAUSED: &str = "Debugger.paused";
    pub const RESUMED: &str = "Debugger.resumed";
}
