//! Static classification of CDP method names.
//!
//! None of this depends on a live connection: every function here is a pure
//! lookup against a fixed set of method names, mirroring the way the
//! original debugger distinguished "interesting" events from noise before
//! ever touching a socket.

/// Events the engine drops silently: never surfaced to a caller, never
/// counted toward quiescence.
const IGNORABLE_EVENTS: &[&str] = &["Debugger.scriptParsed"];

/// Events that mark the debuggee as paused, awaiting a resume-family
/// command.
const PAUSE_MARKERS: &[&str] = &["Debugger.paused"];

/// Events that mark the debuggee (and therefore the session) as finished.
const TERMINATION_MARKERS: &[&str] = &[
    "Inspector.detached",
    "Runtime.executionContextDestroyed",
];

/// Commands that always cause the debuggee to resume running.
const RESUMING_COMMANDS: &[&str] = &[
    "Debugger.resume",
    "Debugger.stepInto",
    "Debugger.stepOver",
    "Debugger.stepOut",
];

/// Commands that may cause the debuggee to start or resume running,
/// depending on its current state.
const MAY_RUN_COMMANDS: &[&str] = &[
    "Runtime.runIfWaitingForDebugger",
    "Debugger.setSkipAllPauses",
];

/// The closed set of CDP methods the engine accepts from a caller unless
/// `allow_unknown` is set. Reproduced verbatim from the original
/// implementation's command whitelist.
const ALLOWED_COMMANDS: &[&str] = &[
    "Debugger.enable",
    "Runtime.enable",
    "Network.enable",
    "HeapProfiler.enable",
    "Profiler.enable",
    "Debugger.resume",
    "Debugger.pause",
    "Debugger.stepOver",
    "Debugger.stepInto",
    "Debugger.stepOut",
    "Debugger.setBreakpointByUrl",
    "Debugger.setBreakpointOnFunctionCall",
    "Debugger.removeBreakpoint",
    "Debugger.setSkipAllPauses",
    "Debugger.setBlackboxPatterns",
    "Debugger.setPauseOnExceptions",
    "Debugger.getScriptSource",
    "Debugger.getStackTrace",
    "Runtime.evaluate",
    "Debugger.evaluateOnCallFrame",
    "Runtime.callFunctionOn",
    "Runtime.getProperties",
    "Runtime.runIfWaitingForDebugger",
    "HeapProfiler.takeHeapSnapshot",
    "HeapProfiler.startSampling",
    "HeapProfiler.stopSampling",
    "Profiler.start",
    "Profiler.stop",
    "Profiler.startPreciseCoverage",
    "Profiler.takePreciseCoverage",
    "Profiler.stopPreciseCoverage",
];

/// The sequence of domain-enable commands `initialize` sends before
/// `Runtime.runIfWaitingForDebugger`.
pub const INITIALIZE_ENABLE_COMMANDS: &[&str] = &[
    "Runtime.enable",
    "Debugger.enable",
    "HeapProfiler.enable",
    "Profiler.enable",
    "Network.enable",
];

#[must_use]
pub fn is_ignorable_event(method: &str) -> bool {
    IGNORABLE_EVENTS.contains(&method)
}

#[must_use]
pub fn is_pause_marker(method: &str) -> bool {
    PAUSE_MARKERS.contains(&method)
}

#[must_use]
pub fn is_termination_marker(method: &str) -> bool {
    TERMINATION_MARKERS.contains(&method)
}

/// A pause marker or a termination marker: the two events that end a
/// `wait_for_quiescence` call early.
#[must_use]
pub fn is_quiescence_marker(method: &str) -> bool {
    is_pause_marker(method) || is_termination_marker(method)
}

#[must_use]
pub fn is_resuming_command(method: &str) -> bool {
    RESUMING_COMMANDS.contains(&method)
}

#[must_use]
pub fn is_may_run_command(method: &str) -> bool {
    MAY_RUN_COMMANDS.contains(&method)
}

/// Whether executing `method` may cause the debuggee to run, and therefore
/// requires the engine to wait for the next quiescence marker afterward.
#[must_use]
pub fn may_cause_run(method: &str) -> bool {
    is_resuming_command(method) || is_may_run_command(method)
}

#[must_use]
pub fn is_allowed_command(method: &str) -> bool {
    ALLOWED_COMMANDS.contains(&method)
}
