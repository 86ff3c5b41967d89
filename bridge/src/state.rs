/// Session lifetime. `Started` is terminal: a crashed or stopped server is
/// reported but never auto-restarted, and restarting means constructing a
/// fresh bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    NotStarted,
    Starting,
    Started,
}

/// Notifications to the bridge's external collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Discovery and process launch are under way.
    Starting,
    /// The server reported readiness; commands will now be acted on.
    Started,
    /// The server process exited. The session is not restarted.
    ServerExited,
    /// A line for the log panel.
    Log(String),
    /// The log panel should be cleared (clear-log-on-run policy).
    ClearLog,
    /// A line for the cue panel.
    Cue(String),
    /// Any rendered error highlight should be removed before the next run.
    ClearError,
    /// A compile-time error. `line` is in absolute editor coordinates.
    SyntaxError {
        job_id: i32,
        description: String,
        context: String,
        line: i32,
    },
    /// A runtime error. `line` is in absolute editor coordinates.
    RuntimeError {
        job_id: i32,
        description: String,
        backtrace: String,
        line: i32,
    },
}
